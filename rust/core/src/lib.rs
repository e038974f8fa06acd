// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! pipescan core data model
//!
//! Types shared by every pipeline stage: point cloud regions, fitted
//! primitives, and classified utility elements. Constructors enforce the
//! model invariants; components re-check them at their own boundary with
//! `validate()` because fields stay public for callers and serialization.

pub mod disjoint;
pub mod element;
pub mod error;
pub mod ids;
pub mod primitive;
pub mod region;

pub use disjoint::DisjointSets;
pub use element::{Material, SystemType, UtilityElement, UtilityType};
pub use error::{Error, Result};
pub use ids::{ElementId, IdGenerator};
pub use primitive::{CrossSection, DetectedPrimitive, PrimitiveGeometry, PrimitiveKind};
pub use region::PointCloudRegion;

// Geometry types appear in most public signatures
pub use pipescan_geometry::{Centerline, Point3D};
