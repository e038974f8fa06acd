// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segment merging
//!
//! Scan gaps split one physical run into several detections. Aligned
//! elements (same type, similar diameter, near-parallel, end-to-end within
//! tolerance) are unioned transitively and replaced by a single element.
//! Passes repeat until nothing merges, so the output is a fixpoint and
//! merging it again is a no-op.

use crate::error::{Error, Result};
use crate::types::MergeConfig;
use pipescan_core::{DisjointSets, ElementId, UtilityElement};
use pipescan_geometry::{acute_angle_deg, Centerline, Point3D};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

const DUPLICATE_POINT_EPSILON: f64 = 1e-9;

/// Merge aligned segments into continuous runs
///
/// Output is sorted by id. A merged element takes the lowest constituent id
/// and lists all original constituents in `sources`.
pub fn merge_segments(
    elements: &[UtilityElement],
    config: &MergeConfig,
) -> Result<Vec<UtilityElement>> {
    let mut seen = FxHashSet::default();
    for element in elements {
        element.validate()?;
        if !seen.insert(element.id) {
            return Err(Error::DuplicateId(element.id));
        }
    }

    let mut current: Vec<UtilityElement> = elements.to_vec();
    current.sort_by_key(|e| e.id);

    let mut passes = 0usize;
    loop {
        passes += 1;
        let (next, merged_any) = merge_pass(&current, config)?;
        current = next;
        if !merged_any {
            break;
        }
    }

    tracing::debug!(
        input = elements.len(),
        output = current.len(),
        passes,
        "merged segments"
    );
    Ok(current)
}

/// True when `b` continues `a` within the merge tolerances
pub fn are_aligned(a: &UtilityElement, b: &UtilityElement, config: &MergeConfig) -> bool {
    if a.utility_type != b.utility_type {
        return false;
    }
    let larger = a.diameter.max(b.diameter);
    if (a.diameter - b.diameter).abs() / larger > config.diameter_tolerance {
        return false;
    }

    let dir_a = a.centerline.direction();
    let dir_b = b.centerline.direction();
    if acute_angle_deg(&dir_a, &dir_b) >= config.angle_tolerance_deg {
        return false;
    }

    let (pa, pb) = nearest_endpoints(&a.centerline, &b.centerline);
    if pa.distance_to(&pb) > config.gap_tolerance {
        return false;
    }

    // Offset of each nearest endpoint from the other run's axis line
    let lateral = |from: &Point3D, to: &Point3D, axis: &pipescan_geometry::Vector3<f64>| {
        let v = from.vector_to(to);
        (v - axis * v.dot(axis)).norm()
    };
    lateral(&pa, &pb, &dir_a) <= config.lateral_tolerance
        && lateral(&pb, &pa, &dir_b) <= config.lateral_tolerance
}

fn nearest_endpoints(a: &Centerline, b: &Centerline) -> (Point3D, Point3D) {
    let pairs = [
        (a.start(), b.start()),
        (a.start(), b.end()),
        (a.end(), b.start()),
        (a.end(), b.end()),
    ];
    let mut best = pairs[0];
    for pair in &pairs[1..] {
        if pair.0.distance_sq(&pair.1) < best.0.distance_sq(&best.1) {
            best = *pair;
        }
    }
    best
}

/// One union-find pass over `elements` (sorted by id)
fn merge_pass(
    elements: &[UtilityElement],
    config: &MergeConfig,
) -> Result<(Vec<UtilityElement>, bool)> {
    let bounds: Vec<_> = elements
        .iter()
        .map(|e| e.centerline.bounds().expanded(config.gap_tolerance))
        .collect();

    let bounds = &bounds;
    let pairs: Vec<(usize, usize)> = (0..elements.len())
        .into_par_iter()
        .flat_map_iter(move |i| {
            ((i + 1)..elements.len())
                .filter(move |&j| bounds[i].intersects(&bounds[j]))
                .filter(move |&j| are_aligned(&elements[i], &elements[j], config))
                .map(move |j| (i, j))
        })
        .collect();

    if pairs.is_empty() {
        return Ok((elements.to_vec(), false));
    }

    let mut sets = DisjointSets::new(elements.len());
    for &(i, j) in &pairs {
        sets.union(i, j);
    }

    let mut out = Vec::new();
    for group in sets.groups() {
        if group.len() == 1 {
            out.push(elements[group[0]].clone());
            continue;
        }
        let members: Vec<&UtilityElement> = group.iter().map(|&i| &elements[i]).collect();
        out.push(combine(&members)?);
    }
    out.sort_by_key(|e| e.id);
    Ok((out, true))
}

/// Replace a group of aligned elements by one run
fn combine(members: &[&UtilityElement]) -> Result<UtilityElement> {
    // Highest confidence leads; lowest id breaks ties (members are id-sorted)
    let mut leader = members[0];
    for m in &members[1..] {
        if m.confidence > leader.confidence {
            leader = m;
        }
    }
    let axis = leader.centerline.direction();

    let mut points: Vec<(f64, Point3D)> = Vec::new();
    for m in members {
        let oriented = if m.centerline.direction().dot(&axis) < 0.0 {
            m.centerline.reversed()
        } else {
            m.centerline.clone()
        };
        points.extend(oriented.points().iter().map(|p| (p.to_vector().dot(&axis), *p)));
    }
    // Stable sort keeps per-member order for equal projections
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut chain: Vec<Point3D> = Vec::with_capacity(points.len());
    for (_, p) in points {
        if chain
            .last()
            .map_or(true, |last| last.distance_to(&p) > DUPLICATE_POINT_EPSILON)
        {
            chain.push(p);
        }
    }
    let centerline = Centerline::new(chain).map_err(pipescan_core::Error::from)?;

    let total_length: f64 = members.iter().map(|m| m.length()).sum();
    let confidence = members
        .iter()
        .map(|m| m.confidence * m.length())
        .sum::<f64>()
        / total_length;

    let mut sources: SmallVec<[ElementId; 2]> = SmallVec::new();
    for m in members {
        if m.sources.is_empty() {
            sources.push(m.id);
        } else {
            sources.extend(m.sources.iter().copied());
        }
    }
    sources.sort();
    sources.dedup();

    let id = members.iter().map(|m| m.id).min().unwrap_or(leader.id);
    let merged = UtilityElement {
        id,
        centerline,
        diameter: leader.diameter,
        utility_type: leader.utility_type,
        material: leader.material,
        system_type: leader.system_type,
        confidence: confidence.clamp(0.0, 1.0),
        sources,
    };
    merged.validate()?;
    Ok(merged)
}
