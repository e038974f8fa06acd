// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Burial depth against a ground surface
//!
//! Each centerline is sampled at evenly spaced parameters. Depth at a
//! sample is `ground(x, y) - z`, positive when buried. Samples where the
//! ground surface has no data are excluded from the statistics; they are
//! never treated as zero depth.

use crate::error::{Error, Result};
use pipescan_core::{ElementId, SystemType, UtilityElement};
use pipescan_geometry::{GroundSurface, Point3D};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum burial depth per system type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthRequirements {
    pub by_system: BTreeMap<SystemType, f64>,
    /// Applies to systems without an entry
    pub default_min_depth: f64,
}

impl Default for DepthRequirements {
    fn default() -> Self {
        let by_system = BTreeMap::from([
            (SystemType::Water, 4.0),
            (SystemType::Sanitary, 6.0),
            (SystemType::Storm, 3.0),
        ]);
        Self {
            by_system,
            default_min_depth: 2.0,
        }
    }
}

impl DepthRequirements {
    pub fn minimum_for(&self, system: SystemType) -> f64 {
        self.by_system
            .get(&system)
            .copied()
            .unwrap_or(self.default_min_depth)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    /// Samples per centerline, endpoints included
    pub samples: usize,
    pub requirements: DepthRequirements,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            samples: 20,
            requirements: DepthRequirements::default(),
        }
    }
}

/// Depth statistics of one element. `None` when no sample had ground data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDepth {
    pub element_id: ElementId,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub average_depth: Option<f64>,
    /// Minimum depth to the top of the run (depth minus radius)
    pub min_cover: Option<f64>,
    pub samples_used: usize,
    pub samples_missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthViolation {
    pub element_id: ElementId,
    pub system_type: SystemType,
    pub required_depth: f64,
    pub actual_depth: f64,
    /// Sample with the shallowest depth
    pub location: Point3D,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthReport {
    pub elements: Vec<ElementDepth>,
    /// Statistics over every sample with ground data
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub average_depth: Option<f64>,
    pub violations: Vec<DepthViolation>,
    pub samples_missing: usize,
}

struct Sampled {
    depth: ElementDepth,
    sum: f64,
    shallowest: Option<Point3D>,
}

/// Sample burial depth along every element
///
/// Fails with [`Error::NoGroundData`] when elements were given but the
/// surface returned no data for any sample.
pub fn analyze_depths<G: GroundSurface + ?Sized>(
    elements: &[UtilityElement],
    ground: &G,
    config: &DepthConfig,
) -> Result<DepthReport> {
    if config.samples == 0 {
        return Err(Error::InvalidConfig("depth samples must be at least 1".into()));
    }
    for element in elements {
        element.validate()?;
    }
    if elements.is_empty() {
        return Ok(DepthReport::default());
    }

    let sampled: Vec<Sampled> = elements
        .par_iter()
        .map(|element| sample_element(element, ground, config.samples))
        .collect();

    let used: usize = sampled.iter().map(|s| s.depth.samples_used).sum();
    let missing: usize = sampled.iter().map(|s| s.depth.samples_missing).sum();
    if used == 0 {
        return Err(Error::NoGroundData { samples: missing });
    }

    let mut report = DepthReport {
        samples_missing: missing,
        ..DepthReport::default()
    };
    let mut total = 0.0;
    for (element, s) in elements.iter().zip(&sampled) {
        if let Some(min) = s.depth.min_depth {
            report.min_depth = Some(report.min_depth.map_or(min, |m: f64| m.min(min)));
        }
        if let Some(max) = s.depth.max_depth {
            report.max_depth = Some(report.max_depth.map_or(max, |m: f64| m.max(max)));
        }
        total += s.sum;

        let required = config.requirements.minimum_for(element.system_type);
        if let (Some(actual), Some(location)) = (s.depth.min_depth, s.shallowest) {
            if actual < required {
                report.violations.push(DepthViolation {
                    element_id: element.id,
                    system_type: element.system_type,
                    required_depth: required,
                    actual_depth: actual,
                    location,
                });
            }
        }
        if s.depth.samples_used == 0 {
            tracing::warn!(element = %element.id, "no ground data along element");
        }
    }
    report.average_depth = Some(total / used as f64);
    report.elements = sampled.into_iter().map(|s| s.depth).collect();

    tracing::debug!(
        elements = elements.len(),
        samples = used,
        missing,
        violations = report.violations.len(),
        "depth analysis complete"
    );
    Ok(report)
}

fn sample_element<G: GroundSurface + ?Sized>(
    element: &UtilityElement,
    ground: &G,
    samples: usize,
) -> Sampled {
    let mut depth = ElementDepth {
        element_id: element.id,
        min_depth: None,
        max_depth: None,
        average_depth: None,
        min_cover: None,
        samples_used: 0,
        samples_missing: 0,
    };
    let mut sum = 0.0;
    let mut shallowest: Option<(f64, Point3D)> = None;

    for p in element.centerline.sample(samples) {
        let Some(surface) = ground.elevation_at(p.x, p.y).filter(|z| z.is_finite()) else {
            depth.samples_missing += 1;
            continue;
        };
        let d = surface - p.z;
        depth.samples_used += 1;
        sum += d;
        depth.max_depth = Some(depth.max_depth.map_or(d, |m| m.max(d)));
        if shallowest.map_or(true, |(m, _)| d < m) {
            shallowest = Some((d, p));
        }
    }

    depth.min_depth = shallowest.map(|(d, _)| d);
    depth.min_cover = depth.min_depth.map(|d| d - element.radius());
    if depth.samples_used > 0 {
        depth.average_depth = Some(sum / depth.samples_used as f64);
    }
    Sampled {
        depth,
        sum,
        shallowest: shallowest.map(|(_, p)| p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pipescan_core::{Centerline, UtilityType};
    use pipescan_geometry::{FlatSurface, GridSurface, PlaneSurface};

    fn buried(id: u64, z: f64, system: SystemType) -> UtilityElement {
        UtilityElement::new(
            ElementId(id),
            Centerline::line(Point3D::new(0.0, 0.0, z), Point3D::new(50.0, 0.0, z)).unwrap(),
            0.5,
            UtilityType::Pipe,
        )
        .unwrap()
        .with_system(system)
    }

    #[test]
    fn test_constant_depth() {
        let ground = FlatSurface::new(100.0);
        let config = DepthConfig::default();

        for depth in [2.5, 4.5, 7.0, 12.0] {
            let element = buried(1, 100.0 - depth, SystemType::Water);
            let report = analyze_depths(&[element], &ground, &config).unwrap();
            assert_relative_eq!(report.min_depth.unwrap(), depth, epsilon = 1e-9);
            assert_relative_eq!(report.max_depth.unwrap(), depth, epsilon = 1e-9);
            assert_relative_eq!(report.average_depth.unwrap(), depth, epsilon = 1e-9);
            let expected = usize::from(depth < 4.0);
            assert_eq!(report.violations.len(), expected, "depth {depth}");
            assert_eq!(report.elements[0].samples_used, 20);
        }
    }

    #[test]
    fn test_requirements_per_system() {
        let ground = FlatSurface::new(0.0);
        let config = DepthConfig::default();
        let elements = vec![
            buried(1, -5.0, SystemType::Sanitary),
            buried(2, -5.0, SystemType::Storm),
            buried(3, -1.5, SystemType::Gas),
            buried(4, -3.5, SystemType::Water),
        ];
        let report = analyze_depths(&elements, &ground, &config).unwrap();
        let ids: Vec<_> = report.violations.iter().map(|v| v.element_id.0).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_relative_eq!(report.violations[0].required_depth, 6.0);
        assert_relative_eq!(report.violations[1].required_depth, 2.0);
        assert_relative_eq!(report.elements[0].min_cover.unwrap(), 4.75);
    }

    #[test]
    fn test_sloped_run_min_max() {
        let ground = FlatSurface::new(0.0);
        let element = UtilityElement::new(
            ElementId(1),
            Centerline::line(Point3D::new(0.0, 0.0, -4.0), Point3D::new(100.0, 0.0, -6.0)).unwrap(),
            1.0,
            UtilityType::Pipe,
        )
        .unwrap();
        let report = analyze_depths(&[element], &ground, &DepthConfig::default()).unwrap();
        assert_relative_eq!(report.min_depth.unwrap(), 4.0, epsilon = 1e-9);
        assert_relative_eq!(report.max_depth.unwrap(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(report.average_depth.unwrap(), 5.0, epsilon = 1e-9);
        assert!(report.violations.is_empty());

        // Tilted ground: 1% rise along x
        let tilted = PlaneSurface {
            origin: Point3D::new(0.0, 0.0, 0.0),
            grade_x: 0.01,
            grade_y: 0.0,
        };
        let flat_run = buried(2, -3.0, SystemType::Unknown);
        let report = analyze_depths(&[flat_run], &tilted, &DepthConfig::default()).unwrap();
        assert_relative_eq!(report.min_depth.unwrap(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(report.max_depth.unwrap(), 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_samples_excluded() {
        // Grid covers x in [0, 20] only
        let ground = GridSurface::new(0.0, -10.0, 10.0, 3, 3, vec![0.0; 9]).unwrap();
        let element = buried(1, -5.0, SystemType::Water);
        let report = analyze_depths(&[element], &ground, &DepthConfig::default()).unwrap();
        let stats = &report.elements[0];
        assert!(stats.samples_missing > 0);
        assert_eq!(stats.samples_used + stats.samples_missing, 20);
        assert_relative_eq!(stats.min_depth.unwrap(), 5.0, epsilon = 1e-9);
        assert_eq!(report.samples_missing, stats.samples_missing);
    }

    #[test]
    fn test_no_ground_data_is_hard_failure() {
        let ground = GridSurface::new(1000.0, 1000.0, 10.0, 2, 2, vec![0.0; 4]).unwrap();
        let element = buried(1, -5.0, SystemType::Water);
        let err = analyze_depths(&[element], &ground, &DepthConfig::default()).unwrap_err();
        assert!(matches!(err, Error::NoGroundData { samples: 20 }));
        assert!(analyze_depths(&[], &ground, &DepthConfig::default())
            .unwrap()
            .violations
            .is_empty());
    }
}
