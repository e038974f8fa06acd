// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Intersection analysis and fitting topology selection
//!
//! Every unordered pair of runs is tested for a closest approach within
//! tolerance. Pair hits whose meeting points lie within tolerance of each
//! other are grouped into one junction, and the junction's participant
//! count and angle select the fitting topology:
//!
//! | participants | condition                          | topology |
//! |--------------|------------------------------------|----------|
//! | 2            | within 5° of 90°                   | Elbow    |
//! | 2            | below 15°                          | Reducer  |
//! | 2            | other angles                       | Elbow    |
//! | 3            | below 60° on a gravity system      | Wye      |
//! | 3            | otherwise                          | Tee      |
//! | 4            |                                    | Cross    |
//! | more         |                                    | Unknown  |
//!
//! Elements are processed in id order and every tie prefers the lowest id,
//! so the result does not depend on input order.

use crate::error::{Error, Result};
use pipescan_core::{DisjointSets, ElementId, UtilityElement};
use pipescan_geometry::{acute_angle_deg, centroid, Point3D, Vector3};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Connection pattern at a junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FittingTopology {
    Elbow,
    Tee,
    Wye,
    Cross,
    Reducer,
    /// No clean match: the caller must handle the junction manually
    Unknown,
}

impl FittingTopology {
    pub fn as_str(&self) -> &'static str {
        match self {
            FittingTopology::Elbow => "Elbow",
            FittingTopology::Tee => "Tee",
            FittingTopology::Wye => "Wye",
            FittingTopology::Cross => "Cross",
            FittingTopology::Reducer => "Reducer",
            FittingTopology::Unknown => "Unknown",
        }
    }

    pub const ALL: [FittingTopology; 6] = [
        FittingTopology::Elbow,
        FittingTopology::Tee,
        FittingTopology::Wye,
        FittingTopology::Cross,
        FittingTopology::Reducer,
        FittingTopology::Unknown,
    ];
}

impl std::fmt::Display for FittingTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for intersection analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    /// Max centerline distance that counts as meeting
    pub tolerance: f64,
    /// Angles within this of 90° are right-angle elbows (degrees)
    pub right_angle_tolerance_deg: f64,
    /// Two runs meeting below this angle are a size transition (degrees)
    pub reducer_max_angle_deg: f64,
    /// Three-way gravity junctions below this angle are wyes (degrees)
    pub wye_max_angle_deg: f64,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            right_angle_tolerance_deg: 5.0,
            reducer_max_angle_deg: 15.0,
            wye_max_angle_deg: 60.0,
        }
    }
}

impl IntersectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "intersection tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// A junction between two or more runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    /// Participant ids, ascending
    pub participants: Vec<ElementId>,
    /// Diameters of the participants, same order
    pub diameters: Vec<f64>,
    pub point: Point3D,
    /// Acute angle between the dominant directions (degrees, 0-90)
    pub angle_deg: f64,
    pub topology: FittingTopology,
    /// True when any participant carries a gravity-flow system
    pub gravity: bool,
}

/// Pick the topology from participant count, angle and flow regime
pub fn classify_topology(
    participants: usize,
    angle_deg: f64,
    gravity: bool,
    config: &IntersectionConfig,
) -> FittingTopology {
    match participants {
        2 if (angle_deg - 90.0).abs() <= config.right_angle_tolerance_deg => FittingTopology::Elbow,
        2 if angle_deg < config.reducer_max_angle_deg => FittingTopology::Reducer,
        2 => FittingTopology::Elbow,
        3 if angle_deg < config.wye_max_angle_deg && gravity => FittingTopology::Wye,
        3 => FittingTopology::Tee,
        4 => FittingTopology::Cross,
        _ => FittingTopology::Unknown,
    }
}

#[derive(Debug, Clone, Copy)]
struct PairHit {
    a: usize,
    b: usize,
    point: Point3D,
}

/// Find all junctions among `elements`
pub fn analyze_intersections(
    elements: &[UtilityElement],
    config: &IntersectionConfig,
) -> Result<Vec<Intersection>> {
    config.validate()?;
    let mut seen = FxHashSet::default();
    for element in elements {
        element.validate()?;
        if !seen.insert(element.id) {
            return Err(Error::DuplicateId(element.id));
        }
    }

    let mut sorted: Vec<&UtilityElement> = elements.iter().collect();
    sorted.sort_by_key(|e| e.id);
    let sorted = &sorted;

    let tolerance = config.tolerance;
    let bounds: Vec<_> = sorted
        .iter()
        .map(|e| e.centerline.bounds().expanded(tolerance))
        .collect();
    let bounds = &bounds;

    let hits: Vec<PairHit> = (0..sorted.len())
        .into_par_iter()
        .flat_map_iter(move |a| {
            ((a + 1)..sorted.len()).filter_map(move |b| {
                if !bounds[a].intersects(&bounds[b]) {
                    return None;
                }
                let approach = sorted[a].centerline.min_distance(&sorted[b].centerline);
                (approach.distance <= tolerance).then(|| PairHit {
                    a,
                    b,
                    point: approach.midpoint(),
                })
            })
        })
        .collect();

    // Junctions: pair hits meeting at the same place
    let mut sets = DisjointSets::new(hits.len());
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if hits[i].point.distance_to(&hits[j].point) <= tolerance {
                sets.union(i, j);
            }
        }
    }

    let mut intersections = Vec::new();
    for group in sets.groups() {
        let points: Vec<Point3D> = group.iter().map(|&h| hits[h].point).collect();
        let Some(point) = centroid(&points) else {
            continue;
        };

        let mut members: Vec<usize> = group.iter().flat_map(|&h| [hits[h].a, hits[h].b]).collect();
        members.sort_unstable();
        members.dedup();
        members.retain(|&m| sorted[m].centerline.distance_to_point(&point) <= tolerance);
        if members.len() < 2 {
            continue;
        }

        let directions: Vec<Vector3<f64>> = members
            .iter()
            .map(|&m| sorted[m].centerline.segment_direction_near(&point))
            .collect();
        let angle_deg = junction_angle(&directions);
        let gravity = members.iter().any(|&m| sorted[m].system_type.is_gravity());
        let topology = classify_topology(members.len(), angle_deg, gravity, config);

        intersections.push(Intersection {
            participants: members.iter().map(|&m| sorted[m].id).collect(),
            diameters: members.iter().map(|&m| sorted[m].diameter).collect(),
            point,
            angle_deg,
            topology,
            gravity,
        });
    }

    intersections.sort_by(|x, y| {
        x.participants
            .cmp(&y.participants)
            .then(x.point.x.total_cmp(&y.point.x))
            .then(x.point.y.total_cmp(&y.point.y))
            .then(x.point.z.total_cmp(&y.point.z))
    });

    tracing::debug!(
        elements = elements.len(),
        pair_hits = hits.len(),
        intersections = intersections.len(),
        "intersection analysis complete"
    );
    Ok(intersections)
}

/// Angle of a junction from the local directions of its participants (id order).
///
/// Two participants: their acute angle. Three or more: the most parallel
/// pair forms the run, and the angle is the largest acute angle between the
/// run and any other participant.
fn junction_angle(directions: &[Vector3<f64>]) -> f64 {
    match directions.len() {
        0 | 1 => 0.0,
        2 => acute_angle_deg(&directions[0], &directions[1]),
        n => {
            let mut run = (0usize, 1usize, f64::MAX);
            for i in 0..n {
                for j in (i + 1)..n {
                    let angle = acute_angle_deg(&directions[i], &directions[j]);
                    if angle < run.2 {
                        run = (i, j, angle);
                    }
                }
            }
            let run_direction = directions[run.0];
            (0..n)
                .filter(|&k| k != run.0 && k != run.1)
                .map(|k| acute_angle_deg(&run_direction, &directions[k]))
                .fold(0.0, f64::max)
        }
    }
}
