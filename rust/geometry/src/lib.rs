// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! pipescan geometry primitives
//!
//! Plain value types (points, polyline centerlines, bounding boxes, ground
//! surfaces) owned entirely by this crate, with nalgebra for the vector math.
//! Host CAD types are converted at the boundary, never used in here.

pub mod bounds;
pub mod centerline;
pub mod distance;
pub mod error;
pub mod point;
pub mod surface;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

pub use bounds::Aabb;
pub use centerline::Centerline;
pub use distance::{acute_angle_deg, segment_segment_closest, ClosestApproach};
pub use error::{Error, Result};
pub use point::{centroid, Point3D};
pub use surface::{FlatSurface, GridSurface, GroundSurface, Plane, PlaneSurface};
