// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utility network construction
//!
//! - [`analyze_intersections`]: junctions between runs and their fitting topology
//! - [`resolve_fitting`]: catalog lookup with nearest-size fallback
//! - [`create_network`]: batch materialization through an [`AuthoringSink`]
//!   with per-item error collection and an endpoint connectivity pass

pub mod assembler;
pub mod catalog;
pub mod error;
pub mod graph;
pub mod intersection;
pub mod resolver;
pub mod sink;

pub use assembler::{
    create_network, Connection, CreatedRun, CreatedStructure, ItemError, ItemErrorKind,
    NetworkResult, NetworkSettings,
};
pub use catalog::{CatalogCache, CatalogEntry, FittingCatalog, PartKind};
pub use error::{Error, Result};
pub use graph::{NetworkGraph, NodeKey, RunKey};
pub use intersection::{
    analyze_intersections, classify_topology, FittingTopology, Intersection, IntersectionConfig,
};
pub use resolver::{resolve_fitting, resolve_part, resolve_segment, FittingSelection, MatchKind};
pub use sink::{
    AuthoringSink, PlacedFitting, RecordingSink, RunHandle, RunRequest, SinkError,
    StructureHandle, StructureKind, StructureRequest,
};
