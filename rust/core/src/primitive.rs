// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fitted primitives, prior to semantic classification.

use crate::error::{Error, Result};
use crate::ids::ElementId;
use pipescan_geometry::{Centerline, Point3D, Vector3};
use serde::{Deserialize, Serialize};

/// Primitive kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Cylinder,
    Plane,
}

/// Cross-section of a fitted cylinder-like primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrossSection {
    Round,
    /// Box section (ducts, cable trays). Width is the larger dimension.
    Rectangular { width: f64, height: f64 },
}

/// Fitted geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveGeometry {
    /// Axis from `start` to `end` with radius (half the equivalent diameter).
    Cylinder {
        start: Point3D,
        end: Point3D,
        radius: f64,
        profile: CrossSection,
    },
    /// Bounded planar patch. `extent_u`/`extent_v` are full side lengths.
    Plane {
        origin: Point3D,
        normal: Point3D,
        extent_u: f64,
        extent_v: f64,
    },
}

impl PrimitiveGeometry {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveGeometry::Cylinder { .. } => PrimitiveKind::Cylinder,
            PrimitiveGeometry::Plane { .. } => PrimitiveKind::Plane,
        }
    }

    /// Axis length for cylinders, `None` for planes.
    pub fn cylinder_length(&self) -> Option<f64> {
        match self {
            PrimitiveGeometry::Cylinder { start, end, .. } => Some(start.distance_to(end)),
            PrimitiveGeometry::Plane { .. } => None,
        }
    }

    /// Slenderness `length / (2 * radius)` for cylinders.
    pub fn aspect_ratio(&self) -> Option<f64> {
        match self {
            PrimitiveGeometry::Cylinder {
                start, end, radius, ..
            } if *radius > 0.0 => Some(start.distance_to(end) / (2.0 * radius)),
            _ => None,
        }
    }
}

/// A primitive produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPrimitive {
    pub id: ElementId,
    pub geometry: PrimitiveGeometry,
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Number of scan points supporting the fit
    pub point_count: usize,
}

impl DetectedPrimitive {
    pub fn kind(&self) -> PrimitiveKind {
        self.geometry.kind()
    }

    /// Check confidence range and geometric sanity.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidConfidence {
                id: self.id,
                confidence: self.confidence,
            });
        }
        match &self.geometry {
            PrimitiveGeometry::Cylinder {
                start, end, radius, ..
            } => {
                if !(*radius > 0.0 && radius.is_finite()) {
                    return Err(Error::InvalidRadius {
                        id: self.id,
                        radius: *radius,
                    });
                }
                Centerline::line(*start, *end).map_err(|source| Error::Centerline {
                    id: self.id,
                    source,
                })?;
            }
            PrimitiveGeometry::Plane {
                origin,
                normal,
                extent_u,
                extent_v,
            } => {
                let n: Vector3<f64> = normal.to_vector();
                if !origin.is_finite() || !(n.norm() > 1e-9) {
                    return Err(Error::DegeneratePrimitive {
                        id: self.id,
                        reason: "plane normal is zero or non-finite".into(),
                    });
                }
                if !(*extent_u > 0.0 && *extent_v > 0.0) {
                    return Err(Error::DegeneratePrimitive {
                        id: self.id,
                        reason: format!("plane extent {} x {}", extent_u, extent_v),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cylinder(length: f64, radius: f64) -> DetectedPrimitive {
        DetectedPrimitive {
            id: ElementId(1),
            geometry: PrimitiveGeometry::Cylinder {
                start: Point3D::new(0.0, 0.0, 0.0),
                end: Point3D::new(length, 0.0, 0.0),
                radius,
                profile: CrossSection::Round,
            },
            confidence: 0.9,
            point_count: 100,
        }
    }

    #[test]
    fn aspect_ratio() {
        assert_relative_eq!(cylinder(10.0, 0.5).geometry.aspect_ratio().unwrap(), 10.0);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(cylinder(10.0, 0.5).validate().is_ok());
        assert!(matches!(
            cylinder(10.0, 0.0).validate(),
            Err(Error::InvalidRadius { .. })
        ));
        assert!(matches!(
            cylinder(0.0, 0.5).validate(),
            Err(Error::Centerline { .. })
        ));
        let mut p = cylinder(10.0, 0.5);
        p.confidence = 1.2;
        assert!(matches!(p.validate(), Err(Error::InvalidConfidence { .. })));
    }
}
