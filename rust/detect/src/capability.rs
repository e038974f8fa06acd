// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detection capability seam
//!
//! Fitting is delegated to a [`DetectionCapability`]: given the points of one
//! cluster, return candidate primitives with a confidence. A trained model
//! can sit behind this trait without touching the pipeline.
//!
//! [`HeuristicCapability`] is the reference implementation. It fits by
//! principal component analysis of the cluster:
//! - one dominant axis → cylinder (radius from mean radial distance)
//! - one vanishing axis → plane
//! - anything else is a blob and yields no candidate

use crate::error::CapabilityError;
use crate::types::Candidate;
use nalgebra::{Matrix3, Vector3};
use pipescan_core::{CrossSection, PrimitiveGeometry};
use pipescan_geometry::{centroid, Point3D};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Black-box primitive fitting over a single cluster
pub trait DetectionCapability: Send + Sync {
    /// Fit candidates to the given points. May return zero candidates.
    fn detect(&self, points: &[Point3D]) -> Result<Vec<Candidate>, CapabilityError>;

    /// Name used in logs and error messages
    fn name(&self) -> &str {
        "capability"
    }
}

impl<T: DetectionCapability + ?Sized> DetectionCapability for Box<T> {
    fn detect(&self, points: &[Point3D]) -> Result<Vec<Candidate>, CapabilityError> {
        (**self).detect(points)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: DetectionCapability + ?Sized> DetectionCapability for Arc<T> {
    fn detect(&self, points: &[Point3D]) -> Result<Vec<Candidate>, CapabilityError> {
        (**self).detect(points)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Tuning for the PCA reference capability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// λ1 / λ2 above this → linear (cylinder)
    pub linear_ratio: f64,
    /// λ3 / λ2 below this → flat (plane)
    pub planar_ratio: f64,
    /// Radial coefficient of variation above this → box section
    pub rectangular_cv: f64,
    /// Radial coefficient of variation at which round-fit quality reaches zero
    pub max_round_cv: f64,
    /// Fixed fit quality reported for box sections
    pub rectangular_fit_quality: f64,
    /// Point count at which support stops limiting confidence
    pub full_support_points: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            linear_ratio: 4.0,
            planar_ratio: 0.05,
            rectangular_cv: 0.06,
            max_round_cv: 0.5,
            rectangular_fit_quality: 0.9,
            full_support_points: 50,
        }
    }
}

/// PCA-based primitive fitting
#[derive(Debug, Clone, Default)]
pub struct HeuristicCapability {
    pub config: HeuristicConfig,
}

impl HeuristicCapability {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    fn support_factor(&self, n: usize) -> f64 {
        (n as f64 / self.config.full_support_points.max(1) as f64).min(1.0)
    }

    fn fit_cylinder(
        &self,
        points: &[Point3D],
        center: &Vector3<f64>,
        axis: &Vector3<f64>,
        minor: (&Vector3<f64>, &Vector3<f64>),
    ) -> Option<Candidate> {
        let (t_min, t_max) = projection_range(points, center, axis);
        let start = Point3D::from_vector(&(center + axis * t_min));
        let end = Point3D::from_vector(&(center + axis * t_max));

        let radial: Vec<f64> = points
            .iter()
            .map(|p| {
                let v = p.to_vector() - center;
                (v - axis * v.dot(axis)).norm()
            })
            .collect();
        let n = radial.len() as f64;
        let mean = radial.iter().sum::<f64>() / n;
        if !(mean > 0.0) {
            return None;
        }
        let variance = radial.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let cv = variance.sqrt() / mean;

        let support = self.support_factor(points.len());
        let (radius, profile, quality) = if cv > self.config.rectangular_cv {
            let (a_min, a_max) = projection_range(points, center, minor.0);
            let (b_min, b_max) = projection_range(points, center, minor.1);
            let (ea, eb) = (a_max - a_min, b_max - b_min);
            let width = ea.max(eb);
            let height = ea.min(eb);
            if !(height > 0.0) {
                return None;
            }
            (
                width / 2.0,
                CrossSection::Rectangular { width, height },
                self.config.rectangular_fit_quality,
            )
        } else {
            let quality = (1.0 - cv / self.config.max_round_cv).clamp(0.0, 1.0);
            (mean, CrossSection::Round, quality)
        };

        Some(Candidate::new(
            PrimitiveGeometry::Cylinder {
                start,
                end,
                radius,
                profile,
            },
            (support * quality).clamp(0.0, 1.0),
        ))
    }

    fn fit_plane(
        &self,
        points: &[Point3D],
        center: &Vector3<f64>,
        normal: &Vector3<f64>,
        in_plane: (&Vector3<f64>, &Vector3<f64>),
        flatness: f64,
    ) -> Option<Candidate> {
        let (u_min, u_max) = projection_range(points, center, in_plane.0);
        let (v_min, v_max) = projection_range(points, center, in_plane.1);
        let support = self.support_factor(points.len());
        let quality = (1.0 - (flatness / self.config.planar_ratio).sqrt() * 0.5).clamp(0.0, 1.0);
        Some(Candidate::new(
            PrimitiveGeometry::Plane {
                origin: Point3D::from_vector(center),
                normal: Point3D::from_vector(normal),
                extent_u: u_max - u_min,
                extent_v: v_max - v_min,
            },
            (support * quality).clamp(0.0, 1.0),
        ))
    }
}

impl DetectionCapability for HeuristicCapability {
    fn detect(&self, points: &[Point3D]) -> Result<Vec<Candidate>, CapabilityError> {
        if points.len() < 3 {
            return Ok(Vec::new());
        }
        let center = match centroid(points) {
            Some(c) => c.to_vector(),
            None => return Ok(Vec::new()),
        };

        let mut cov = Matrix3::<f64>::zeros();
        for p in points {
            let d = p.to_vector() - center;
            cov += d * d.transpose();
        }
        cov /= points.len() as f64;

        let eigen = cov.symmetric_eigen();
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
        let l1 = eigen.eigenvalues[order[0]].max(0.0);
        let l2 = eigen.eigenvalues[order[1]].max(0.0);
        let l3 = eigen.eigenvalues[order[2]].max(0.0);
        let e1: Vector3<f64> = eigen.eigenvectors.column(order[0]).into_owned();
        let e2: Vector3<f64> = eigen.eigenvectors.column(order[1]).into_owned();
        let e3: Vector3<f64> = eigen.eigenvectors.column(order[2]).into_owned();

        if l1 <= f64::EPSILON {
            return Ok(Vec::new());
        }

        let candidate = if l2 <= f64::EPSILON || l1 / l2 > self.config.linear_ratio {
            self.fit_cylinder(points, &center, &e1, (&e2, &e3))
        } else if l3 / l2 < self.config.planar_ratio {
            self.fit_plane(points, &center, &e3, (&e1, &e2), l3 / l2)
        } else {
            None
        };

        Ok(candidate.into_iter().collect())
    }

    fn name(&self) -> &str {
        "heuristic-pca"
    }
}

fn projection_range(points: &[Point3D], center: &Vector3<f64>, axis: &Vector3<f64>) -> (f64, f64) {
    points.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
        let t = (p.to_vector() - center).dot(axis);
        (lo.min(t), hi.max(t))
    })
}
