// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utility classification of fitted primitives
//!
//! Cylinders become utility elements:
//! - box section, wide and flat → CableTray
//! - box section otherwise → Duct
//! - small round section running in a parallel bundle → Conduit
//! - round section otherwise → Pipe
//!
//! Planes become structural elements (Wall, Column, Slab, Beam). They are
//! reported so callers can mask them, but they never enter the utility
//! network.
//!
//! The combined confidence is `detection * consistency` where consistency
//! is a weighted mean of scores in [0, 1], so it can never exceed the
//! detection confidence.

use crate::types::ClassifierConfig;
use pipescan_core::{
    CrossSection, DetectedPrimitive, ElementId, Material, PrimitiveGeometry, SystemType,
    UtilityElement, UtilityType,
};
use pipescan_geometry::{acute_angle_deg, segment_segment_closest, Centerline, Point3D, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structural classification of planar primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuralKind {
    Wall,
    Column,
    Slab,
    Beam,
}

/// A planar primitive classified as structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralElement {
    pub id: ElementId,
    pub kind: StructuralKind,
    pub origin: Point3D,
    pub normal: Point3D,
    pub extent_u: f64,
    pub extent_v: f64,
    pub confidence: f64,
}

/// A primitive that could not be classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: ElementId,
    pub reason: String,
}

/// Classification result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Utility elements grouped by type, each group sorted by id
    pub by_type: BTreeMap<UtilityType, Vec<UtilityElement>>,
    pub structural: Vec<StructuralElement>,
    pub rejected: Vec<Rejection>,
}

impl Classification {
    pub fn utility_count(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn of_type(&self, utility_type: UtilityType) -> &[UtilityElement] {
        self.by_type
            .get(&utility_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All utility elements, sorted by id
    pub fn utilities(&self) -> Vec<UtilityElement> {
        let mut all: Vec<UtilityElement> = self.by_type.values().flatten().cloned().collect();
        all.sort_by_key(|e| e.id);
        all
    }

    pub fn into_utilities(self) -> Vec<UtilityElement> {
        let mut all: Vec<UtilityElement> = self.by_type.into_values().flatten().collect();
        all.sort_by_key(|e| e.id);
        all
    }
}

/// Axis of a round cylinder, used for bundle detection
struct Axis {
    index: usize,
    start: Point3D,
    end: Point3D,
}

/// Classify primitives into utility types and structural elements
pub fn classify(primitives: &[DetectedPrimitive], config: &ClassifierConfig) -> Classification {
    let mut result = Classification::default();

    // Small round cylinders are conduit candidates; bundle membership needs
    // all of them at once.
    let small_round: Vec<Axis> = primitives
        .iter()
        .enumerate()
        .filter_map(|(index, p)| match &p.geometry {
            PrimitiveGeometry::Cylinder {
                start,
                end,
                radius,
                profile: CrossSection::Round,
            } if 2.0 * radius <= config.conduit_max_diameter => Some(Axis {
                index,
                start: *start,
                end: *end,
            }),
            _ => None,
        })
        .collect();
    let bundled = bundled_indices(&small_round, config);

    for (index, primitive) in primitives.iter().enumerate() {
        if let Err(err) = primitive.validate() {
            result.rejected.push(Rejection {
                id: primitive.id,
                reason: err.to_string(),
            });
            continue;
        }

        match &primitive.geometry {
            PrimitiveGeometry::Cylinder {
                start,
                end,
                radius,
                profile,
            } => {
                let in_bundle = bundled.contains(&index);
                match classify_cylinder(
                    primitive, *start, *end, *radius, *profile, in_bundle, config,
                ) {
                    Ok(element) => result
                        .by_type
                        .entry(element.utility_type)
                        .or_default()
                        .push(element),
                    Err(reason) => result.rejected.push(Rejection {
                        id: primitive.id,
                        reason,
                    }),
                }
            }
            PrimitiveGeometry::Plane {
                origin,
                normal,
                extent_u,
                extent_v,
            } => match classify_plane(primitive, origin, normal, *extent_u, *extent_v, config) {
                Ok(element) => result.structural.push(element),
                Err(reason) => result.rejected.push(Rejection {
                    id: primitive.id,
                    reason,
                }),
            },
        }
    }

    for group in result.by_type.values_mut() {
        group.sort_by_key(|e| e.id);
    }
    result.structural.sort_by_key(|s| s.id);
    result.rejected.sort_by_key(|r| r.id);
    result
}

/// Indices (into `primitives`) of small round runs with a parallel neighbour
fn bundled_indices(axes: &[Axis], config: &ClassifierConfig) -> Vec<usize> {
    let mut bundled = Vec::new();
    for (i, a) in axes.iter().enumerate() {
        let dir_a = a.start.vector_to(&a.end);
        let has_neighbour = axes.iter().enumerate().any(|(j, b)| {
            if i == j {
                return false;
            }
            let dir_b = b.start.vector_to(&b.end);
            acute_angle_deg(&dir_a, &dir_b) <= config.bundle_angle_deg
                && segment_segment_closest(&a.start, &a.end, &b.start, &b.end).distance
                    <= config.bundle_distance
        });
        if has_neighbour {
            bundled.push(a.index);
        }
    }
    bundled
}

fn classify_cylinder(
    primitive: &DetectedPrimitive,
    start: Point3D,
    end: Point3D,
    radius: f64,
    profile: CrossSection,
    in_bundle: bool,
    config: &ClassifierConfig,
) -> std::result::Result<UtilityElement, String> {
    let diameter = 2.0 * radius;
    let axis = start.vector_to(&end);

    let utility_type = match profile {
        CrossSection::Rectangular { width, height } => {
            if height > 0.0
                && width / height >= config.tray_min_aspect
                && height <= config.tray_max_height
            {
                UtilityType::CableTray
            } else {
                UtilityType::Duct
            }
        }
        CrossSection::Round if diameter <= config.conduit_max_diameter && in_bundle => {
            UtilityType::Conduit
        }
        CrossSection::Round => UtilityType::Pipe,
    };

    let regularity = primitive
        .geometry
        .aspect_ratio()
        .map_or(0.0, |aspect| (aspect / config.regular_aspect_ratio).min(1.0));
    let orientation = orientation_score(&axis, config.orientation_tolerance_deg);
    let bundle = match profile {
        CrossSection::Round if diameter <= config.conduit_max_diameter && !in_bundle => {
            config.lone_small_pipe_score
        }
        _ => 1.0,
    };
    let consistency = weighted_consistency(regularity, orientation, bundle, config);
    let confidence = (primitive.confidence * consistency).clamp(0.0, primitive.confidence);

    let centerline = Centerline::line(start, end).map_err(|e| e.to_string())?;
    let element = UtilityElement::new(primitive.id, centerline, diameter, utility_type)
        .map_err(|e| e.to_string())?
        .with_material(infer_material(utility_type, diameter, config))
        .with_system(infer_system(utility_type, diameter, &axis, config))
        .with_confidence(confidence);
    Ok(element)
}

fn classify_plane(
    primitive: &DetectedPrimitive,
    origin: &Point3D,
    normal: &Point3D,
    extent_u: f64,
    extent_v: f64,
    config: &ClassifierConfig,
) -> std::result::Result<StructuralElement, String> {
    // Angle between the plane normal and the vertical axis
    let tilt = acute_angle_deg(&normal.to_vector(), &Vector3::z());

    let (kind, consistency) = if tilt <= config.plane_tolerance_deg {
        (StructuralKind::Slab, 1.0)
    } else if tilt >= 90.0 - config.plane_tolerance_deg {
        if extent_u <= config.column_max_extent && extent_v <= config.column_max_extent {
            (StructuralKind::Column, 1.0)
        } else {
            (StructuralKind::Wall, 1.0)
        }
    } else {
        (StructuralKind::Beam, config.beam_consistency.clamp(0.0, 1.0))
    };

    let confidence = primitive.confidence * consistency;
    if kind == StructuralKind::Beam && confidence < config.min_beam_confidence {
        return Err(format!(
            "beam candidate confidence {:.3} below {:.3}",
            confidence, config.min_beam_confidence
        ));
    }

    Ok(StructuralElement {
        id: primitive.id,
        kind,
        origin: *origin,
        normal: *normal,
        extent_u,
        extent_v,
        confidence,
    })
}

/// 1.0 for runs within tolerance of horizontal or vertical, falling to 0.0 at 45°
fn orientation_score(axis: &Vector3<f64>, tolerance_deg: f64) -> f64 {
    let from_horizontal = 90.0 - acute_angle_deg(axis, &Vector3::z());
    let deviation = from_horizontal.min(90.0 - from_horizontal);
    if deviation <= tolerance_deg {
        return 1.0;
    }
    let span = (45.0 - tolerance_deg).max(f64::EPSILON);
    (1.0 - (deviation - tolerance_deg) / span).clamp(0.0, 1.0)
}

fn weighted_consistency(
    regularity: f64,
    orientation: f64,
    bundle: f64,
    config: &ClassifierConfig,
) -> f64 {
    let w = &config.weights;
    let total = w.regularity + w.orientation + w.bundle;
    if !(total > 0.0) {
        return 1.0;
    }
    ((w.regularity * regularity + w.orientation * orientation + w.bundle * bundle) / total)
        .clamp(0.0, 1.0)
}

pub fn infer_material(
    utility_type: UtilityType,
    diameter: f64,
    config: &ClassifierConfig,
) -> Material {
    match utility_type {
        UtilityType::Conduit => Material::Pvc,
        UtilityType::Duct | UtilityType::CableTray => Material::Steel,
        UtilityType::Pipe if diameter <= config.copper_max_diameter => Material::Copper,
        UtilityType::Pipe if diameter <= config.pvc_max_diameter => Material::Pvc,
        UtilityType::Pipe if diameter <= config.ductile_iron_max_diameter => Material::DuctileIron,
        UtilityType::Pipe => Material::Concrete,
        UtilityType::Unknown => Material::Unknown,
    }
}

/// System inference from type, size and grade (rise over horizontal run)
pub fn infer_system(
    utility_type: UtilityType,
    diameter: f64,
    axis: &Vector3<f64>,
    config: &ClassifierConfig,
) -> SystemType {
    match utility_type {
        UtilityType::Duct => SystemType::Hvac,
        UtilityType::Conduit | UtilityType::CableTray => SystemType::Electrical,
        UtilityType::Unknown => SystemType::Unknown,
        UtilityType::Pipe => {
            let run = (axis.x * axis.x + axis.y * axis.y).sqrt();
            if run <= f64::EPSILON {
                return SystemType::Unknown;
            }
            let grade = axis.z.abs() / run;
            if grade < config.gravity_min_grade {
                SystemType::Water
            } else if grade <= config.gravity_max_grade {
                if diameter >= config.storm_min_diameter {
                    SystemType::Storm
                } else {
                    SystemType::Sanitary
                }
            } else {
                SystemType::Unknown
            }
        }
    }
}
