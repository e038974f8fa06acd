// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration loaded from JSON with environment overrides.

use crate::error::{Error, Result};
use pipescan_detect::{ClassifierConfig, DetectionConfig, HeuristicConfig, MergeConfig};
use pipescan_network::{IntersectionConfig, NetworkSettings};
use pipescan_underground::UndergroundConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every stage's tunables in one document.
///
/// Missing sections fall back to their defaults, so `{}` is a valid
/// configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectionConfig,
    /// Tuning for the built-in PCA capability (ignored by other capabilities)
    pub heuristic: HeuristicConfig,
    pub classifier: ClassifierConfig,
    pub merge: MergeConfig,
    pub intersection: IntersectionConfig,
    pub underground: UndergroundConfig,
    pub network: NetworkSettings,
    /// Size of the worker pool. `None` uses the global rayon pool.
    pub worker_threads: Option<usize>,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Apply `PIPESCAN_*` environment variables on top of this configuration.
    ///
    /// Unparseable values are ignored and the current value is kept.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with a custom lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(t) = get("PIPESCAN_CONFIDENCE_THRESHOLD").and_then(|v| v.parse::<f64>().ok()) {
            self.detection.confidence_threshold = t;
        }
        if let Some(r) = get("PIPESCAN_CLUSTER_RADIUS").and_then(|v| v.parse::<f64>().ok()) {
            self.detection.cluster_radius = r;
        }
        if let Some(n) = get("PIPESCAN_DEPTH_SAMPLES").and_then(|v| v.parse::<usize>().ok()) {
            self.underground.depth.samples = n;
        }
        if let Some(n) = get("PIPESCAN_WORKER_THREADS").and_then(|v| v.parse::<usize>().ok()) {
            // 0 means "use the global pool"
            self.worker_threads = (n > 0).then_some(n);
        }
        self
    }

    /// Check the settings that would otherwise only fail mid-run
    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.intersection.validate()?;
        self.network.validate()?;
        if self.underground.depth.samples == 0 {
            return Err(Error::InvalidConfig("depth samples must be at least 1".into()));
        }
        if self.worker_threads == Some(0) {
            return Err(Error::InvalidConfig("worker_threads must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[test]
    fn test_empty_json_is_default() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_relative_eq!(config.detection.confidence_threshold, 0.85);
        assert_relative_eq!(config.underground.clash.matrix.default_clearance(), 2.0);
        assert_eq!(config.underground.depth.samples, 20);
        assert!(config.worker_threads.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "detection": { "confidence_threshold": 0.6 },
                "intersection": { "tolerance": 1.5 },
                "worker_threads": 2
            }"#,
        )
        .unwrap();
        assert_relative_eq!(config.detection.confidence_threshold, 0.6);
        assert_relative_eq!(config.detection.cluster_radius, 0.5);
        assert_relative_eq!(config.intersection.tolerance, 1.5);
        assert_eq!(config.worker_threads, Some(2));
    }

    #[test]
    fn test_overrides_parse_with_fallback() {
        let vars: HashMap<&str, &str> = [
            ("PIPESCAN_CONFIDENCE_THRESHOLD", "0.7"),
            ("PIPESCAN_CLUSTER_RADIUS", "not-a-number"),
            ("PIPESCAN_DEPTH_SAMPLES", " 40 "),
            ("PIPESCAN_WORKER_THREADS", "0"),
        ]
        .into_iter()
        .collect();
        let config = PipelineConfig {
            worker_threads: Some(4),
            ..PipelineConfig::default()
        }
        .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_relative_eq!(config.detection.confidence_threshold, 0.7);
        assert_relative_eq!(config.detection.cluster_radius, 0.5);
        assert_eq!(config.underground.depth.samples, 40);
        assert!(config.worker_threads.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.detection.confidence_threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::Detect(_))));

        let config = PipelineConfig {
            worker_threads: Some(0),
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = PipelineConfig::from_json_file("/nonexistent/pipescan.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pipescan.json"));
    }
}
