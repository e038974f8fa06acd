// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validation errors for the shared data model.

use crate::ids::ElementId;

/// Result type alias for model validation.
pub type Result<T> = std::result::Result<T, Error>;

/// Input-shape errors raised when a model value violates its invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Diameter must be positive and finite.
    #[error("element {id}: diameter must be positive, got {diameter}")]
    InvalidDiameter { id: ElementId, diameter: f64 },

    /// Confidence must lie in [0, 1].
    #[error("element {id}: confidence {confidence} outside [0, 1]")]
    InvalidConfidence { id: ElementId, confidence: f64 },

    /// Radius of a fitted cylinder must be positive and finite.
    #[error("primitive {id}: radius must be positive, got {radius}")]
    InvalidRadius { id: ElementId, radius: f64 },

    /// Primitive geometry is degenerate (zero-length axis, zero normal, ...).
    #[error("primitive {id}: degenerate geometry: {reason}")]
    DegeneratePrimitive { id: ElementId, reason: String },

    /// Centerline geometry error for a specific element.
    #[error("element {id}: {source}")]
    Centerline {
        id: ElementId,
        #[source]
        source: pipescan_geometry::Error,
    },

    /// Geometry error not tied to an element.
    #[error(transparent)]
    Geometry(#[from] pipescan_geometry::Error),
}
