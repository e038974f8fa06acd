// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use pipescan_core::ElementId;
use thiserror::Error;

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in intersection analysis, fitting resolution and
/// network assembly.
///
/// Unresolved catalog lookups and per-item batch failures are not errors:
/// they are reported as values in the respective results.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid fitting sizes: {0}")]
    InvalidSizes(String),

    #[error("Invalid catalog entry '{key}': {reason}")]
    InvalidCatalogEntry { key: String, reason: String },

    #[error("Duplicate element id {0}")]
    DuplicateId(ElementId),

    #[error("Invalid element: {0}")]
    Model(#[from] pipescan_core::Error),

    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
