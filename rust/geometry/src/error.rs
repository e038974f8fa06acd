// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building geometry values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Centerline needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("Centerline has zero length (all points coincide)")]
    ZeroLength,

    #[error("Non-finite coordinate at point {0}")]
    NonFinite(usize),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Degenerate plane normal")]
    DegenerateNormal,
}
