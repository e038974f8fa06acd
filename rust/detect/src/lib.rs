// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utility inference from point clouds
//!
//! This crate covers the first three pipeline stages:
//! 1. Clustering scan points and fitting cylinders/planes through an
//!    injectable [`DetectionCapability`]
//! 2. Classifying fitted primitives into utility types
//! 3. Merging aligned segments into continuous runs
//!
//! # Usage
//!
//! ```rust,ignore
//! use pipescan_detect::{
//!     merge_segments, DetectionConfig, HeuristicCapability, MergeConfig, PrimitiveDetector,
//! };
//!
//! let detector =
//!     PrimitiveDetector::new(HeuristicCapability::default(), DetectionConfig::default());
//! let utilities = detector.detect_utilities(&region, 0.85)?;
//! let runs = merge_segments(&utilities, &MergeConfig::default())?;
//! ```

pub mod capability;
pub mod classifier;
pub mod cluster;
pub mod detector;
pub mod error;
pub mod merge;
pub mod types;

pub use capability::{DetectionCapability, HeuristicCapability, HeuristicConfig};
pub use classifier::{classify, Classification, Rejection, StructuralElement, StructuralKind};
pub use cluster::cluster_points;
pub use detector::{is_pipe_like, PrimitiveDetector};
pub use error::{CapabilityError, Error, Result};
pub use merge::{are_aligned, merge_segments};
pub use types::{Candidate, ClassifierConfig, ConsistencyWeights, DetectionConfig, MergeConfig};
