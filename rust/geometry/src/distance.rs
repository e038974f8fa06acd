// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closest-approach queries between points and line segments

use crate::point::Point3D;
use nalgebra::Vector3;

const EPSILON: f64 = 1e-12;

/// Closest approach between two geometric entities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    /// Minimum distance
    pub distance: f64,
    /// Closest point on the first entity
    pub on_first: Point3D,
    /// Closest point on the second entity
    pub on_second: Point3D,
}

impl ClosestApproach {
    /// Midpoint between the two closest points
    pub fn midpoint(&self) -> Point3D {
        self.on_first.midpoint(&self.on_second)
    }
}

/// Parameter of the projection of `point` onto segment `a-b`, clamped to [0, 1]
pub fn project_onto_segment(point: &Point3D, a: &Point3D, b: &Point3D) -> f64 {
    let ab = a.vector_to(b);
    let len_sq = ab.norm_squared();
    if len_sq < EPSILON {
        return 0.0;
    }
    (a.vector_to(point).dot(&ab) / len_sq).clamp(0.0, 1.0)
}

/// Distance from a point to a segment
pub fn point_segment_distance(point: &Point3D, a: &Point3D, b: &Point3D) -> f64 {
    let t = project_onto_segment(point, a, b);
    point.distance_to(&a.lerp(b, t))
}

/// Closest points between segments `p1-q1` and `p2-q2`.
///
/// Clamped formulation from Ericson, "Real-Time Collision Detection" §5.1.9.
/// Parallel and degenerate (point-like) segments are handled.
pub fn segment_segment_closest(
    p1: &Point3D,
    q1: &Point3D,
    p2: &Point3D,
    q2: &Point3D,
) -> ClosestApproach {
    let d1 = p1.vector_to(q1);
    let d2 = p2.vector_to(q2);
    let r = p2.vector_to(p1);
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    let (s, t) = if a <= EPSILON && e <= EPSILON {
        (0.0, 0.0)
    } else if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let mut s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                // Parallel: any s works, pick the start
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    let on_first = p1.lerp(q1, s);
    let on_second = p2.lerp(q2, t);
    ClosestApproach {
        distance: on_first.distance_to(&on_second),
        on_first,
        on_second,
    }
}

/// Acute angle between two directions in degrees, in [0, 90].
///
/// Direction sign is ignored: a pipe drawn east-to-west has the same
/// orientation as one drawn west-to-east.
pub fn acute_angle_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let na = a.norm();
    let nb = b.norm();
    if na < EPSILON || nb < EPSILON {
        return 0.0;
    }
    let cos = (a.dot(b) / (na * nb)).abs().clamp(0.0, 1.0);
    cos.acos().to_degrees()
}

/// 2D segment crossing test in plan (XY), endpoints touching counts as crossing
pub fn plan_segments_cross(p1: &Point3D, q1: &Point3D, p2: &Point3D, q2: &Point3D) -> bool {
    fn orient(a: &Point3D, b: &Point3D, c: &Point3D) -> f64 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }
    fn on_segment(a: &Point3D, b: &Point3D, p: &Point3D) -> bool {
        p.x >= a.x.min(b.x) - EPSILON
            && p.x <= a.x.max(b.x) + EPSILON
            && p.y >= a.y.min(b.y) - EPSILON
            && p.y <= a.y.max(b.y) + EPSILON
    }

    let o1 = orient(p1, q1, p2);
    let o2 = orient(p1, q1, q2);
    let o3 = orient(p2, q2, p1);
    let o4 = orient(p2, q2, q1);

    if ((o1 > EPSILON && o2 < -EPSILON) || (o1 < -EPSILON && o2 > EPSILON))
        && ((o3 > EPSILON && o4 < -EPSILON) || (o3 < -EPSILON && o4 > EPSILON))
    {
        return true;
    }

    (o1.abs() <= EPSILON && on_segment(p1, q1, p2))
        || (o2.abs() <= EPSILON && on_segment(p1, q1, q2))
        || (o3.abs() <= EPSILON && on_segment(p2, q2, p1))
        || (o4.abs() <= EPSILON && on_segment(p2, q2, q1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3D {
        Point3D::new(x, y, z)
    }

    #[test]
    fn test_point_segment_distance() {
        let d = point_segment_distance(&p(5.0, 5.0, 0.0), &p(0.0, 0.0, 0.0), &p(10.0, 0.0, 0.0));
        assert_relative_eq!(d, 5.0);
        // Beyond the end clamps to the endpoint
        let d = point_segment_distance(&p(13.0, 4.0, 0.0), &p(0.0, 0.0, 0.0), &p(10.0, 0.0, 0.0));
        assert_relative_eq!(d, 5.0);
    }

    #[test]
    fn test_skew_segments() {
        // X axis at z=0 and Y axis at z=2 cross in plan at the origin
        let c = segment_segment_closest(
            &p(-5.0, 0.0, 0.0),
            &p(5.0, 0.0, 0.0),
            &p(0.0, -5.0, 2.0),
            &p(0.0, 5.0, 2.0),
        );
        assert_relative_eq!(c.distance, 2.0, epsilon = 1e-10);
        assert_relative_eq!(c.on_first.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(c.on_second.y, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_parallel_segments() {
        let c = segment_segment_closest(
            &p(0.0, 0.0, 0.0),
            &p(10.0, 0.0, 0.0),
            &p(2.0, 1.5, 0.0),
            &p(8.0, 1.5, 0.0),
        );
        assert_relative_eq!(c.distance, 1.5, epsilon = 1e-10);
    }

    #[test]
    fn test_disjoint_collinear_segments() {
        let c = segment_segment_closest(
            &p(0.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(3.0, 0.0, 0.0),
            &p(4.0, 0.0, 0.0),
        );
        assert_relative_eq!(c.distance, 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_acute_angle() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        let diag = Vector3::new(-1.0, 1.0, 0.0);
        assert_relative_eq!(acute_angle_deg(&x, &y), 90.0, epsilon = 1e-9);
        assert_relative_eq!(acute_angle_deg(&x, &-x), 0.0, epsilon = 1e-6);
        assert_relative_eq!(acute_angle_deg(&x, &diag), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_plan_crossing() {
        assert!(plan_segments_cross(
            &p(-1.0, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            &p(0.0, -1.0, 5.0),
            &p(0.0, 1.0, 5.0),
        ));
        assert!(!plan_segments_cross(
            &p(0.0, 0.0, 0.0),
            &p(10.0, 0.0, 0.0),
            &p(0.0, 1.5, 0.0),
            &p(10.0, 1.5, 0.0),
        ));
    }
}
