// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parametrized polyline centerlines
//!
//! A [`Centerline`] is the axis of a run (pipe, duct, conduit, tray). It is
//! validated on construction: at least two points, all finite, and not all
//! coincident. Every query below can therefore assume a non-zero length.

use crate::bounds::Aabb;
use crate::distance::{
    plan_segments_cross, point_segment_distance, project_onto_segment, segment_segment_closest,
    ClosestApproach,
};
use crate::error::{Error, Result};
use crate::point::Point3D;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

const SEGMENT_EPSILON: f64 = 1e-9;

/// Polyline axis of a linear element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point3D>", into = "Vec<Point3D>")]
pub struct Centerline {
    points: SmallVec<[Point3D; 4]>,
}

impl Centerline {
    /// Build a centerline, rejecting degenerate input
    pub fn new(points: impl IntoIterator<Item = Point3D>) -> Result<Self> {
        let points: SmallVec<[Point3D; 4]> = points.into_iter().collect();
        if points.len() < 2 {
            return Err(Error::TooFewPoints(points.len()));
        }
        if let Some(i) = points.iter().position(|p| !p.is_finite()) {
            return Err(Error::NonFinite(i));
        }
        let first = points[0];
        if points.iter().all(|p| p.distance_sq(&first) < SEGMENT_EPSILON * SEGMENT_EPSILON) {
            return Err(Error::ZeroLength);
        }
        Ok(Self { points })
    }

    /// Straight two-point centerline
    pub fn line(start: Point3D, end: Point3D) -> Result<Self> {
        Self::new([start, end])
    }

    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    pub fn start(&self) -> Point3D {
        self.points[0]
    }

    pub fn end(&self) -> Point3D {
        self.points[self.points.len() - 1]
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Iterator over `(start, end)` segment pairs, including zero-length ones
    pub fn segments(&self) -> impl Iterator<Item = (&Point3D, &Point3D)> + '_ {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance_to(b)).sum()
    }

    /// Dominant direction (unit vector from start to end).
    ///
    /// Closed or nearly closed polylines fall back to the longest segment.
    pub fn direction(&self) -> Vector3<f64> {
        let chord = self.start().vector_to(&self.end());
        if chord.norm() > SEGMENT_EPSILON {
            return chord.normalize();
        }
        self.segments()
            .map(|(a, b)| a.vector_to(b))
            .max_by(|a, b| a.norm().total_cmp(&b.norm()))
            .map(|v| v.normalize())
            .unwrap_or_else(Vector3::x)
    }

    /// Point at normalized arc-length parameter `t` in [0, 1]
    pub fn point_at(&self, t: f64) -> Point3D {
        let t = t.clamp(0.0, 1.0);
        let total = self.length();
        let target = t * total;
        let mut walked = 0.0;
        for (a, b) in self.segments() {
            let seg = a.distance_to(b);
            if seg < SEGMENT_EPSILON {
                continue;
            }
            if walked + seg >= target {
                return a.lerp(b, (target - walked) / seg);
            }
            walked += seg;
        }
        self.end()
    }

    /// `n` points at evenly spaced parameters, endpoints included
    pub fn sample(&self, n: usize) -> Vec<Point3D> {
        match n {
            0 => Vec::new(),
            1 => vec![self.point_at(0.5)],
            _ => (0..n)
                .map(|i| self.point_at(i as f64 / (n - 1) as f64))
                .collect(),
        }
    }

    /// Closest point on the centerline and the index of the segment it lies on
    pub fn closest_point(&self, p: &Point3D) -> (Point3D, usize) {
        let mut best = (self.start(), 0usize, f64::MAX);
        for (i, (a, b)) in self.segments().enumerate() {
            let t = project_onto_segment(p, a, b);
            let q = a.lerp(b, t);
            let d = q.distance_sq(p);
            if d < best.2 {
                best = (q, i, d);
            }
        }
        (best.0, best.1)
    }

    pub fn distance_to_point(&self, p: &Point3D) -> f64 {
        self.segments()
            .map(|(a, b)| point_segment_distance(p, a, b))
            .fold(f64::MAX, f64::min)
    }

    /// Unit direction of the (non-degenerate) segment nearest to `p`
    pub fn segment_direction_near(&self, p: &Point3D) -> Vector3<f64> {
        let mut best: Option<(f64, Vector3<f64>)> = None;
        for (a, b) in self.segments() {
            let v = a.vector_to(b);
            if v.norm() < SEGMENT_EPSILON {
                continue;
            }
            let d = point_segment_distance(p, a, b);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, v.normalize()));
            }
        }
        best.map(|(_, v)| v).unwrap_or_else(|| self.direction())
    }

    /// Minimum distance to another centerline with the closest points on each
    pub fn min_distance(&self, other: &Centerline) -> ClosestApproach {
        let mut best = ClosestApproach {
            distance: f64::MAX,
            on_first: self.start(),
            on_second: other.start(),
        };
        for (a, b) in self.segments() {
            for (c, d) in other.segments() {
                let approach = segment_segment_closest(a, b, c, d);
                if approach.distance < best.distance {
                    best = approach;
                }
            }
        }
        best
    }

    /// True when the plan (XY) projections of the two polylines cross
    pub fn crosses_in_plan(&self, other: &Centerline) -> bool {
        self.segments()
            .any(|(a, b)| other.segments().any(|(c, d)| plan_segments_cross(a, b, c, d)))
    }

    pub fn bounds(&self) -> Aabb {
        // Non-empty by construction
        Aabb::from_points(&self.points)
            .unwrap_or_else(|| Aabb::new(self.start(), self.start()))
    }

    pub fn reversed(&self) -> Self {
        Self {
            points: self.points.iter().rev().copied().collect(),
        }
    }

    /// Unit directions of consecutive non-degenerate segments with the vertex between them.
    ///
    /// Used to find bends: each item is `(vertex, incoming, outgoing)`.
    pub fn bends(&self) -> Vec<(Point3D, Vector3<f64>, Vector3<f64>)> {
        let mut dirs: Vec<(Point3D, Point3D, Vector3<f64>)> = Vec::new();
        for (a, b) in self.segments() {
            let v = a.vector_to(b);
            if v.norm() >= SEGMENT_EPSILON {
                dirs.push((*a, *b, v.normalize()));
            }
        }
        dirs.windows(2)
            .map(|w| (w[0].1, w[0].2, w[1].2))
            .collect()
    }
}

impl TryFrom<Vec<Point3D>> for Centerline {
    type Error = Error;

    fn try_from(points: Vec<Point3D>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<Centerline> for Vec<Point3D> {
    fn from(c: Centerline) -> Self {
        c.points.into_vec()
    }
}
