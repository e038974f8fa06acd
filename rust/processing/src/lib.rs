// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buried utility inference pipeline
//!
//! Wires the detect, network and underground crates into one run over a
//! point cloud region and collects every stage's output in a
//! [`PipelineReport`]. Configuration comes from a JSON [`PipelineConfig`]
//! with `PIPESCAN_*` environment overrides.

pub mod config;
pub mod error;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{ClassificationSummary, Pipeline, PipelineReport, ResolvedFitting};
