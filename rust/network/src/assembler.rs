// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batch network creation
//!
//! Each candidate is resolved against the catalog and materialized through
//! the [`AuthoringSink`] independently. A failing item is recorded in
//! [`NetworkResult::errors`] and the batch moves on; the batch itself only
//! fails on invalid settings.

use crate::catalog::FittingCatalog;
use crate::error::{Error, Result};
use crate::graph::NetworkGraph;
use crate::intersection::FittingTopology;
use crate::resolver::{resolve_fitting, resolve_segment, FittingSelection};
use crate::sink::{
    AuthoringSink, PlacedFitting, RunHandle, RunRequest, StructureHandle, StructureKind,
    StructureRequest,
};
use pipescan_core::{ElementId, Material, UtilityElement};
use pipescan_geometry::Point3D;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::BTreeMap;

/// Creation settings for a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Elevation of the reference datum; the sink receives z relative to it
    pub reference_datum: f64,
    /// Material used for candidates whose material is unknown
    pub default_material: Material,
    /// Place inline structures at bends and along long runs
    pub auto_structures: bool,
    /// Max distance between inline structures along a run
    pub max_spacing: f64,
    /// Direction changes above this get an elbow and a structure (degrees)
    pub bend_threshold_deg: f64,
    /// Run endpoints closer than this are connected
    pub connect_tolerance: f64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            reference_datum: 0.0,
            default_material: Material::Pvc,
            auto_structures: true,
            max_spacing: 400.0,
            bend_threshold_deg: 10.0,
            connect_tolerance: 0.5,
        }
    }
}

impl NetworkSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.reference_datum.is_finite() {
            return Err(Error::InvalidConfig("reference datum is not finite".into()));
        }
        if !(self.max_spacing > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_spacing must be positive, got {}",
                self.max_spacing
            )));
        }
        if !(self.connect_tolerance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "connect_tolerance must be positive, got {}",
                self.connect_tolerance
            )));
        }
        Ok(())
    }

    fn relative(&self, p: &Point3D) -> Point3D {
        Point3D::new(p.x, p.y, p.z - self.reference_datum)
    }
}

/// Why an item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemErrorKind {
    InvalidElement,
    UnresolvedSegment,
    UnresolvedFitting,
    Sink,
    Structure,
    Connection,
}

/// A failure attached to one input candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    /// Position of the candidate in the input batch
    pub index: usize,
    pub element_id: ElementId,
    pub kind: ItemErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedRun {
    pub index: usize,
    pub element_id: ElementId,
    pub handle: RunHandle,
    pub material: Material,
    pub segment: FittingSelection,
    pub fittings: Vec<FittingSelection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedStructure {
    pub handle: StructureHandle,
    pub kind: StructureKind,
    /// Datum-relative location
    pub location: Point3D,
    pub element_id: ElementId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub runs: (ElementId, ElementId),
    /// Datum-relative location
    pub point: Point3D,
}

/// Batch outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkResult {
    /// Materialized runs, in input order
    pub created_elements: Vec<CreatedRun>,
    pub created_structures: Vec<CreatedStructure>,
    pub connections: Vec<Connection>,
    /// Number of disjoint networks among the created runs
    pub network_count: usize,
    pub errors: Vec<ItemError>,
}

impl NetworkResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors recorded for one input item
    pub fn errors_for(&self, index: usize) -> impl Iterator<Item = &ItemError> + '_ {
        self.errors.iter().filter(move |e| e.index == index)
    }
}

/// Create a network from candidate runs
pub fn create_network<S: AuthoringSink + ?Sized>(
    elements: &[UtilityElement],
    settings: &NetworkSettings,
    catalog: &FittingCatalog,
    sink: &mut S,
) -> Result<NetworkResult> {
    settings.validate()?;

    // Batch by material; input order within a batch
    let mut batches: BTreeMap<Material, Vec<usize>> = BTreeMap::new();
    for (index, element) in elements.iter().enumerate() {
        batches
            .entry(effective_material(element, settings))
            .or_default()
            .push(index);
    }

    let mut result = NetworkResult::default();
    for (material, indices) in &batches {
        tracing::debug!(material = %material, items = indices.len(), "assembling batch");
        for &index in indices {
            let element = &elements[index];
            match assemble_item(index, element, *material, settings, catalog, sink) {
                Ok((run, structures, soft_errors)) => {
                    result.created_elements.push(run);
                    result.created_structures.extend(structures);
                    result.errors.extend(soft_errors);
                }
                Err(err) => result.errors.push(err),
            }
        }
    }
    result.created_elements.sort_by_key(|r| r.index);

    connect_runs(elements, settings, sink, &mut result);

    result.errors.sort_by_key(|e| e.index);
    for err in &result.errors {
        tracing::warn!(
            index = err.index,
            element = %err.element_id,
            kind = ?err.kind,
            "{}",
            err.message
        );
    }
    tracing::info!(
        candidates = elements.len(),
        created = result.created_elements.len(),
        structures = result.created_structures.len(),
        connections = result.connections.len(),
        networks = result.network_count,
        errors = result.errors.len(),
        "network assembly complete"
    );
    Ok(result)
}

fn effective_material(element: &UtilityElement, settings: &NetworkSettings) -> Material {
    match element.material {
        Material::Unknown => settings.default_material,
        m => m,
    }
}

type ItemOutcome =
    std::result::Result<(CreatedRun, Vec<CreatedStructure>, Vec<ItemError>), ItemError>;

fn assemble_item<S: AuthoringSink + ?Sized>(
    index: usize,
    element: &UtilityElement,
    material: Material,
    settings: &NetworkSettings,
    catalog: &FittingCatalog,
    sink: &mut S,
) -> ItemOutcome {
    let fail = |kind: ItemErrorKind, message: String| ItemError {
        index,
        element_id: element.id,
        kind,
        message,
    };

    element
        .validate()
        .map_err(|e| fail(ItemErrorKind::InvalidElement, e.to_string()))?;

    let system = Some(element.system_type);
    let segment = resolve_segment(catalog, element.diameter, system)
        .map_err(|e| fail(ItemErrorKind::InvalidElement, e.to_string()))?;
    let segment_key = segment.resolved_key.clone().ok_or_else(|| {
        fail(
            ItemErrorKind::UnresolvedSegment,
            format!("no segment part for diameter {}", element.diameter),
        )
    })?;

    let bends: Vec<Point3D> = element
        .centerline
        .bends()
        .into_iter()
        .filter(|(_, incoming, outgoing)| {
            incoming.angle(outgoing).to_degrees() > settings.bend_threshold_deg
        })
        .map(|(vertex, _, _)| vertex)
        .collect();

    let mut fittings = Vec::with_capacity(bends.len());
    let mut placed = Vec::with_capacity(bends.len());
    for vertex in &bends {
        let selection =
            resolve_fitting(catalog, FittingTopology::Elbow, &[element.diameter], system)
                .map_err(|e| fail(ItemErrorKind::InvalidElement, e.to_string()))?;
        let Some(key) = selection.resolved_key.clone() else {
            return Err(fail(
                ItemErrorKind::UnresolvedFitting,
                format!(
                    "no elbow for diameter {} at ({:.2}, {:.2}, {:.2})",
                    element.diameter, vertex.x, vertex.y, vertex.z
                ),
            ));
        };
        placed.push(PlacedFitting {
            location: settings.relative(vertex),
            catalog_key: key,
        });
        fittings.push(selection);
    }

    let request = RunRequest {
        element_id: element.id,
        points: element
            .centerline
            .points()
            .iter()
            .map(|p| settings.relative(p))
            .collect(),
        diameter: element.diameter,
        utility_type: element.utility_type,
        material,
        system_type: element.system_type,
        segment_key,
        fittings: placed,
    };
    let handle = sink
        .create_run(&request)
        .map_err(|e| fail(ItemErrorKind::Sink, e.to_string()))?;

    let mut structures = Vec::new();
    let mut soft_errors = Vec::new();
    if settings.auto_structures {
        let kind = StructureKind::for_system(element.system_type);
        for location in structure_locations(element, &bends, settings.max_spacing) {
            let request = StructureRequest {
                kind,
                location: settings.relative(&location),
                run: handle,
                element_id: element.id,
            };
            match sink.create_structure(&request) {
                Ok(structure) => structures.push(CreatedStructure {
                    handle: structure,
                    kind,
                    location: request.location,
                    element_id: element.id,
                }),
                Err(e) => soft_errors.push(fail(ItemErrorKind::Structure, e.to_string())),
            }
        }
    }

    Ok((
        CreatedRun {
            index,
            element_id: element.id,
            handle,
            material,
            segment,
            fittings,
        },
        structures,
        soft_errors,
    ))
}

/// Bend vertices plus a point every `max_spacing` along the run
fn structure_locations(
    element: &UtilityElement,
    bends: &[Point3D],
    max_spacing: f64,
) -> Vec<Point3D> {
    let length = element.length();
    let mut locations: Vec<Point3D> = bends.to_vec();
    let mut k = 1usize;
    while (k as f64) * max_spacing < length - 1e-9 {
        locations.push(element.centerline.point_at(k as f64 * max_spacing / length));
        k += 1;
    }
    locations
}

/// Join runs whose endpoints coincide and count disjoint networks
fn connect_runs<S: AuthoringSink + ?Sized>(
    elements: &[UtilityElement],
    settings: &NetworkSettings,
    sink: &mut S,
    result: &mut NetworkResult,
) {
    let mut graph = NetworkGraph::new(settings.connect_tolerance);
    let mut item_of = SecondaryMap::new();
    for run in &result.created_elements {
        let centerline = &elements[run.index].centerline;
        let key = graph.add_run(run.element_id, run.handle, centerline.start(), centerline.end());
        item_of.insert(key, run.index);
    }

    let mut connections = Vec::new();
    let mut errors = Vec::new();
    for (_, node) in graph.junctions() {
        let at = settings.relative(&node.position);
        let Some((&first, rest)) = node.runs.split_first() else {
            continue;
        };
        let Some(a) = graph.run(first) else {
            continue;
        };
        for &other in rest {
            let Some(b) = graph.run(other) else {
                continue;
            };
            match sink.connect(a.handle, b.handle, at) {
                Ok(()) => connections.push(Connection {
                    runs: (a.element_id, b.element_id),
                    point: at,
                }),
                Err(e) => {
                    if let Some(&index) = item_of.get(other) {
                        errors.push(ItemError {
                            index,
                            element_id: b.element_id,
                            kind: ItemErrorKind::Connection,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    result.connections = connections;
    result.errors.extend(errors);
    result.network_count = graph.connected_components().len();
}
