// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use pipescan_core::ElementId;
use thiserror::Error;

/// Result type for detection, classification and merging
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an injected detection capability
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that can occur in the detection stages
#[derive(Error, Debug)]
pub enum Error {
    #[error("Detection capability '{name}' failed: {source}")]
    Capability {
        name: String,
        #[source]
        source: CapabilityError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Duplicate element id {0}")]
    DuplicateId(ElementId),

    #[error("Invalid input: {0}")]
    Model(#[from] pipescan_core::Error),
}
