// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model authoring boundary
//!
//! The assembler never touches a document store directly. It issues one
//! request at a time to an [`AuthoringSink`] and keeps the opaque handles
//! it gets back.

use pipescan_core::{ElementId, Material, SystemType, UtilityType};
use pipescan_geometry::Point3D;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle of a materialized run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunHandle(pub u64);

/// Opaque handle of a materialized structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureHandle(pub u64);

/// Failure reported by the authoring sink
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Inline structure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Gravity systems
    Manhole,
    /// Electrical and telecom
    JunctionBox,
    /// Everything else
    Vault,
}

impl StructureKind {
    pub fn for_system(system: SystemType) -> Self {
        match system {
            s if s.is_gravity() => StructureKind::Manhole,
            SystemType::Electrical | SystemType::Telecom => StructureKind::JunctionBox,
            _ => StructureKind::Vault,
        }
    }
}

/// A fitting placed on a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedFitting {
    pub location: Point3D,
    pub catalog_key: String,
}

/// Request to materialize one run. Coordinates are datum-relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub element_id: ElementId,
    pub points: Vec<Point3D>,
    pub diameter: f64,
    pub utility_type: UtilityType,
    pub material: Material,
    pub system_type: SystemType,
    pub segment_key: String,
    pub fittings: Vec<PlacedFitting>,
}

/// Request to place one structure. Location is datum-relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRequest {
    pub kind: StructureKind,
    pub location: Point3D,
    pub run: RunHandle,
    pub element_id: ElementId,
}

/// The external model store
///
/// Calls within one batch are strictly sequential.
pub trait AuthoringSink {
    fn create_run(&mut self, request: &RunRequest) -> Result<RunHandle, SinkError>;

    fn create_structure(
        &mut self,
        request: &StructureRequest,
    ) -> Result<StructureHandle, SinkError>;

    /// Join two runs at a shared endpoint
    fn connect(&mut self, a: RunHandle, b: RunHandle, at: Point3D) -> Result<(), SinkError>;
}

impl<T: AuthoringSink + ?Sized> AuthoringSink for &mut T {
    fn create_run(&mut self, request: &RunRequest) -> Result<RunHandle, SinkError> {
        (**self).create_run(request)
    }

    fn create_structure(
        &mut self,
        request: &StructureRequest,
    ) -> Result<StructureHandle, SinkError> {
        (**self).create_structure(request)
    }

    fn connect(&mut self, a: RunHandle, b: RunHandle, at: Point3D) -> Result<(), SinkError> {
        (**self).connect(a, b, at)
    }
}

/// In-memory sink that records every request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingSink {
    pub runs: Vec<(RunHandle, RunRequest)>,
    pub structures: Vec<(StructureHandle, StructureRequest)>,
    pub connections: Vec<(RunHandle, RunHandle, Point3D)>,
    #[serde(skip)]
    failing_runs: FxHashSet<ElementId>,
    next_handle: u64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_run` fail for this element
    pub fn fail_run_for(mut self, id: ElementId) -> Self {
        self.failing_runs.insert(id);
        self
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl AuthoringSink for RecordingSink {
    fn create_run(&mut self, request: &RunRequest) -> Result<RunHandle, SinkError> {
        if self.failing_runs.contains(&request.element_id) {
            return Err(SinkError::new(format!(
                "document rejected run for element {}",
                request.element_id
            )));
        }
        let handle = RunHandle(self.next());
        self.runs.push((handle, request.clone()));
        Ok(handle)
    }

    fn create_structure(
        &mut self,
        request: &StructureRequest,
    ) -> Result<StructureHandle, SinkError> {
        let handle = StructureHandle(self.next());
        self.structures.push((handle, request.clone()));
        Ok(handle)
    }

    fn connect(&mut self, a: RunHandle, b: RunHandle, at: Point3D) -> Result<(), SinkError> {
        self.connections.push((a, b, at));
        Ok(())
    }
}
