// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Corridor grouping
//!
//! Runs within the grouping distance of each other (transitively) share a
//! corridor. A corridor has an alignment through its centroid spanning the
//! members' extremes, and a required width of `sum(diameter + margin)`.

use crate::error::{Error, Result};
use pipescan_core::{DisjointSets, ElementId, UtilityElement};
use pipescan_geometry::{centroid, Centerline, Point3D, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorConfig {
    /// Max centerline distance between runs of one corridor
    pub grouping_distance: f64,
    /// Working clearance added to each member's diameter
    pub clearance_margin: f64,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            grouping_distance: 5.0,
            clearance_margin: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    /// Member ids, ascending
    pub members: Vec<ElementId>,
    pub alignment: Centerline,
    pub required_width: f64,
}

/// Group runs into corridors, ordered by lowest member id
pub fn group_corridors(
    elements: &[UtilityElement],
    config: &CorridorConfig,
) -> Result<Vec<Corridor>> {
    if !(config.grouping_distance >= 0.0) || !(config.clearance_margin >= 0.0) {
        return Err(Error::InvalidConfig(format!(
            "corridor distances must be non-negative, got {} / {}",
            config.grouping_distance, config.clearance_margin
        )));
    }
    for element in elements {
        element.validate()?;
    }

    let mut sorted: Vec<&UtilityElement> = elements.iter().collect();
    sorted.sort_by_key(|e| e.id);
    let sorted = &sorted;
    let bounds: Vec<_> = sorted
        .iter()
        .map(|e| e.centerline.bounds().expanded(config.grouping_distance))
        .collect();
    let bounds = &bounds;
    let limit = config.grouping_distance;

    let links: Vec<(usize, usize)> = (0..sorted.len())
        .into_par_iter()
        .flat_map_iter(move |i| {
            ((i + 1)..sorted.len()).filter(move |&j| {
                bounds[i].intersects(&bounds[j])
                    && sorted[i].centerline.min_distance(&sorted[j].centerline).distance <= limit
            })
            .map(move |j| (i, j))
        })
        .collect();

    let mut sets = DisjointSets::new(sorted.len());
    for (i, j) in links {
        sets.union(i, j);
    }

    let mut corridors = Vec::new();
    for group in sets.groups() {
        let members: Vec<&UtilityElement> = group.iter().map(|&i| sorted[i]).collect();
        let alignment = alignment_of(&members)?;
        corridors.push(Corridor {
            members: members.iter().map(|m| m.id).collect(),
            required_width: members
                .iter()
                .map(|m| m.diameter + config.clearance_margin)
                .sum(),
            alignment,
        });
    }

    tracing::debug!(
        elements = elements.len(),
        corridors = corridors.len(),
        "corridor grouping complete"
    );
    Ok(corridors)
}

/// Line through the group centroid along the length-weighted mean direction,
/// spanning the projections of all member points
fn alignment_of(members: &[&UtilityElement]) -> Result<Centerline> {
    let reference = members[0].centerline.direction();
    let mut sum = Vector3::zeros();
    for m in members {
        let d = m.centerline.direction();
        let d = if d.dot(&reference) < 0.0 { -d } else { d };
        sum += d * m.length();
    }
    let axis = if sum.norm() > 1e-12 {
        sum.normalize()
    } else {
        reference
    };

    let points: Vec<Point3D> = members
        .iter()
        .flat_map(|m| m.centerline.points().iter().copied())
        .collect();
    let center = centroid(&points).unwrap_or_else(|| members[0].centerline.start());

    let (t_min, t_max) = points.iter().fold((0.0f64, 0.0f64), |(lo, hi), p| {
        let t = center.vector_to(p).dot(&axis);
        (lo.min(t), hi.max(t))
    });

    let mut polyline = vec![center.offset(&(axis * t_min))];
    for p in [center, center.offset(&(axis * t_max))] {
        if polyline.last().map_or(true, |last| last.distance_to(&p) > 1e-9) {
            polyline.push(p);
        }
    }
    Centerline::new(polyline).map_err(|e| Error::Model(e.into()))
}
