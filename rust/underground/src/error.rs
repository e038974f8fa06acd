// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use pipescan_core::ElementId;
use thiserror::Error;

/// Result type for underground analysis
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in underground analysis
#[derive(Error, Debug)]
pub enum Error {
    /// The ground surface returned no elevation for any sample
    #[error("Ground surface has no data for any of the {samples} depth samples")]
    NoGroundData { samples: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Duplicate element id {0}")]
    DuplicateId(ElementId),

    #[error("Invalid element: {0}")]
    Model(#[from] pipescan_core::Error),
}
