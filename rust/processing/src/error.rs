// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline runs
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum Error {
    #[error("Detection failed: {0}")]
    Detect(#[from] pipescan_detect::Error),

    #[error("Network construction failed: {0}")]
    Network(#[from] pipescan_network::Error),

    #[error("Underground analysis failed: {0}")]
    Underground(#[from] pipescan_underground::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
