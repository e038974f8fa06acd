// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive detection over a point cloud region
//!
//! Pipeline:
//! 1. Cluster points by proximity (flood fill over a hash grid)
//! 2. Fit each cluster with the injected [`DetectionCapability`] (in parallel)
//! 3. Drop untrusted output (NaN confidence, degenerate geometry)
//! 4. Keep candidates at or above the confidence threshold
//! 5. Keep cylinders only when they are pipe-like

use crate::capability::DetectionCapability;
use crate::classifier::classify;
use crate::cluster::cluster_points;
use crate::error::{Error, Result};
use crate::types::{Candidate, ClassifierConfig, DetectionConfig};
use pipescan_core::{
    DetectedPrimitive, ElementId, IdGenerator, PointCloudRegion, PrimitiveGeometry,
    UtilityElement,
};
use pipescan_geometry::Point3D;
use rayon::prelude::*;

/// Detects primitives with an injected fitting capability
pub struct PrimitiveDetector<C> {
    capability: C,
    config: DetectionConfig,
    classifier: ClassifierConfig,
}

impl<C: DetectionCapability> PrimitiveDetector<C> {
    pub fn new(capability: C, config: DetectionConfig) -> Self {
        Self {
            capability,
            config,
            classifier: ClassifierConfig::default(),
        }
    }

    /// Classifier settings used by [`PrimitiveDetector::detect_utilities`]
    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    /// Detect primitives using the configured confidence threshold
    pub fn detect(&self, region: &PointCloudRegion) -> Result<Vec<DetectedPrimitive>> {
        self.detect_with_threshold(region, self.config.confidence_threshold)
    }

    /// Detect primitives, keeping candidates with confidence >= `threshold`.
    ///
    /// An empty region yields an empty result. A capability failure on any
    /// cluster fails the whole call.
    pub fn detect_with_threshold(
        &self,
        region: &PointCloudRegion,
        threshold: f64,
    ) -> Result<Vec<DetectedPrimitive>> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidConfig(format!(
                "confidence threshold {} outside [0, 1]",
                threshold
            )));
        }
        self.config.validate()?;

        if region.is_empty() {
            return Ok(Vec::new());
        }

        let clusters = cluster_points(
            &region.points,
            self.config.cluster_radius,
            self.config.min_cluster_points.max(1),
        );
        tracing::debug!(
            region = %region.id,
            points = region.len(),
            clusters = clusters.len(),
            "clustered region"
        );

        let fitted: Vec<(usize, Vec<Candidate>)> = clusters
            .par_iter()
            .map(|indices| {
                let points: Vec<Point3D> = indices.iter().map(|&i| region.points[i]).collect();
                self.capability
                    .detect(&points)
                    .map(|candidates| (points.len(), candidates))
                    .map_err(|source| Error::Capability {
                        name: self.capability.name().to_string(),
                        source,
                    })
            })
            .collect::<Result<_>>()?;

        let mut ids = IdGenerator::starting_at(1);
        let mut primitives = Vec::new();
        let mut untrusted = 0usize;
        let mut below_threshold = 0usize;
        let mut not_pipe_like = 0usize;

        for (point_count, candidates) in fitted {
            for candidate in candidates {
                let primitive = DetectedPrimitive {
                    id: ElementId(0),
                    geometry: candidate.geometry,
                    confidence: candidate.confidence,
                    point_count,
                };
                if let Err(err) = primitive.validate() {
                    tracing::warn!(
                        capability = self.capability.name(),
                        error = %err,
                        "dropping invalid candidate"
                    );
                    untrusted += 1;
                    continue;
                }
                if primitive.confidence < threshold {
                    below_threshold += 1;
                    continue;
                }
                if !is_pipe_like(&primitive.geometry, &self.config) {
                    not_pipe_like += 1;
                    continue;
                }
                primitives.push(DetectedPrimitive {
                    id: ids.next_id(),
                    ..primitive
                });
            }
        }

        tracing::info!(
            region = %region.id,
            detected = primitives.len(),
            untrusted,
            below_threshold,
            not_pipe_like,
            "primitive detection complete"
        );
        Ok(primitives)
    }

    /// Detect and classify, returning utility elements sorted by id
    pub fn detect_utilities(
        &self,
        region: &PointCloudRegion,
        threshold: f64,
    ) -> Result<Vec<UtilityElement>> {
        let primitives = self.detect_with_threshold(region, threshold)?;
        let classification = classify(&primitives, &self.classifier);
        Ok(classification.into_utilities())
    }
}

/// Pipe-likeness filter.
///
/// Cylinders must be slender (`length / (2 * radius)` strictly above the
/// configured ratio) and have a radius inside the configured band. Planes
/// are not subject to this filter.
pub fn is_pipe_like(geometry: &PrimitiveGeometry, config: &DetectionConfig) -> bool {
    match geometry {
        PrimitiveGeometry::Cylinder { radius, .. } => {
            let slender = geometry
                .aspect_ratio()
                .map_or(false, |aspect| aspect > config.min_aspect_ratio);
            slender && *radius >= config.min_radius && *radius <= config.max_radius
        }
        PrimitiveGeometry::Plane { .. } => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::tests::pipe_surface;
    use crate::capability::HeuristicCapability;
    use crate::error::CapabilityError;
    use pipescan_core::{CrossSection, PrimitiveKind, UtilityType};

    /// Returns the same candidates for every cluster
    struct FixedCapability(Vec<Candidate>);

    impl DetectionCapability for FixedCapability {
        fn detect(
            &self,
            _points: &[Point3D],
        ) -> std::result::Result<Vec<Candidate>, CapabilityError> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    impl DetectionCapability for Unreachable {
        fn detect(
            &self,
            _points: &[Point3D],
        ) -> std::result::Result<Vec<Candidate>, CapabilityError> {
            Err(CapabilityError::new("service unreachable"))
        }

        fn name(&self) -> &str {
            "remote"
        }
    }

    fn cylinder(length: f64, radius: f64) -> PrimitiveGeometry {
        PrimitiveGeometry::Cylinder {
            start: Point3D::new(0.0, 0.0, 0.0),
            end: Point3D::new(length, 0.0, 0.0),
            radius,
            profile: CrossSection::Round,
        }
    }

    fn one_cluster() -> PointCloudRegion {
        let points = (0..30).map(|i| Point3D::new(i as f64 * 0.1, 0.0, 0.0)).collect();
        PointCloudRegion::new("r", points)
    }

    #[test]
    fn test_empty_region_is_empty_result() {
        let detector = PrimitiveDetector::new(Unreachable, DetectionConfig::default());
        let region = PointCloudRegion::new("empty", Vec::new());
        assert!(detector.detect(&region).unwrap().is_empty());
    }

    #[test]
    fn test_capability_failure_propagates() {
        let detector = PrimitiveDetector::new(Unreachable, DetectionConfig::default());
        let err = detector.detect(&one_cluster()).unwrap_err();
        match err {
            Error::Capability { name, .. } => assert_eq!(name, "remote"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_threshold_filter() {
        let capability = FixedCapability(vec![
            Candidate::new(cylinder(10.0, 0.25), 0.9),
            Candidate::new(cylinder(10.0, 0.25), 0.84),
            Candidate::new(cylinder(10.0, 0.25), 0.85),
        ]);
        let detector = PrimitiveDetector::new(capability, DetectionConfig::default());
        let found = detector.detect(&one_cluster()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.confidence >= 0.85));
        assert_eq!(found[0].id, ElementId(1));
        assert_eq!(found[1].id, ElementId(2));
    }

    #[test]
    fn test_untrusted_output_dropped() {
        let capability = FixedCapability(vec![
            Candidate::new(cylinder(10.0, 0.25), f64::NAN),
            Candidate::new(cylinder(10.0, 0.25), 1.5),
            Candidate::new(cylinder(0.0, 0.25), 0.95),
            Candidate::new(cylinder(10.0, 0.25), 0.95),
        ]);
        let detector = PrimitiveDetector::new(capability, DetectionConfig::default());
        assert_eq!(detector.detect(&one_cluster()).unwrap().len(), 1);
    }

    #[test]
    fn test_stubby_cylinders_never_pipe_like() {
        let config = DetectionConfig::default();
        for (length, radius) in [(1.5, 0.25), (1.0, 0.5), (0.2, 0.05), (6.0, 1.0)] {
            assert!(
                !is_pipe_like(&cylinder(length, radius), &config),
                "length {length} radius {radius}"
            );
        }
        assert!(is_pipe_like(&cylinder(1.51, 0.25), &config));
        // Outside the radius band
        assert!(!is_pipe_like(&cylinder(100.0, 0.01), &config));
        assert!(!is_pipe_like(&cylinder(100.0, 4.0), &config));

        let capability = FixedCapability(vec![Candidate::new(cylinder(1.5, 0.25), 1.0)]);
        let detector = PrimitiveDetector::new(capability, config);
        assert!(detector.detect(&one_cluster()).unwrap().is_empty());
    }

    #[test]
    fn test_heuristic_end_to_end() {
        let mut points = pipe_surface(0.0, 10.0, 0.0, 0.0, 0.25);
        points.extend(pipe_surface(0.0, 10.0, 20.0, 0.0, 0.1));
        // Conduit bundle partner for the small pipe
        points.extend(pipe_surface(0.0, 10.0, 20.8, 0.0, 0.1));
        let region = PointCloudRegion::new("site", points);

        let detector =
            PrimitiveDetector::new(HeuristicCapability::default(), DetectionConfig::default());
        let primitives = detector.detect(&region).unwrap();
        assert_eq!(primitives.len(), 3);
        assert!(primitives.iter().all(|p| p.kind() == PrimitiveKind::Cylinder));

        let utilities = detector.detect_utilities(&region, 0.85).unwrap();
        assert_eq!(utilities.len(), 3);
        assert!(utilities.windows(2).all(|w| w[0].id < w[1].id));
        let conduits = utilities
            .iter()
            .filter(|u| u.utility_type == UtilityType::Conduit)
            .count();
        assert_eq!(conduits, 2);
    }
}
