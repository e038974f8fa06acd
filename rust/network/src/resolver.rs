// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catalog resolution for fittings and segments
//!
//! Resolution is stateless given a catalog snapshot:
//! 1. Exact `(part, size)` match when the catalog has one
//! 2. Otherwise the closest nominal size of the same part
//! 3. Otherwise (no entry of that part at all) an unresolved selection
//!
//! An unresolved selection is a value, not an error. The caller decides
//! whether it is fatal for the item.

use crate::catalog::{CatalogEntry, FittingCatalog, PartKind, SIZE_MATCH_TOLERANCE};
use crate::error::{Error, Result};
use crate::intersection::FittingTopology;
use pipescan_core::SystemType;
use serde::{Deserialize, Serialize};

/// How a selection was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Exact,
    NearestSize,
    /// No catalog entry of the requested part: generic placeholder
    Unresolved,
}

/// Result of a catalog lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittingSelection {
    pub part: PartKind,
    /// Requested nominal sizes, largest first
    pub sizes: Vec<f64>,
    pub resolved_key: Option<String>,
    /// Nominal size of the selected entry
    pub catalog_size: Option<f64>,
    pub match_kind: MatchKind,
}

impl FittingSelection {
    pub fn is_resolved(&self) -> bool {
        self.match_kind != MatchKind::Unresolved
    }

    pub fn topology(&self) -> Option<FittingTopology> {
        match self.part {
            PartKind::Fitting(topology) => Some(topology),
            PartKind::Segment => None,
        }
    }
}

/// Resolve a fitting for a junction of the given sizes
pub fn resolve_fitting(
    catalog: &FittingCatalog,
    topology: FittingTopology,
    sizes: &[f64],
    system_hint: Option<SystemType>,
) -> Result<FittingSelection> {
    resolve_part(catalog, PartKind::Fitting(topology), sizes, system_hint)
}

/// Resolve the straight segment part for a run diameter
pub fn resolve_segment(
    catalog: &FittingCatalog,
    diameter: f64,
    system_hint: Option<SystemType>,
) -> Result<FittingSelection> {
    resolve_part(catalog, PartKind::Segment, &[diameter], system_hint)
}

/// Resolve any part kind.
///
/// The primary size is the largest requested size, the secondary size the
/// smallest (when more than one size is given). Within the chosen primary
/// size, entries are ranked by system fit first (rated for the hinted
/// system, then unrated, then rated for another system), then by
/// secondary-size distance, then by key.
pub fn resolve_part(
    catalog: &FittingCatalog,
    part: PartKind,
    sizes: &[f64],
    system_hint: Option<SystemType>,
) -> Result<FittingSelection> {
    if sizes.is_empty() {
        return Err(Error::InvalidSizes(format!("no sizes given for {}", part)));
    }
    if let Some(bad) = sizes.iter().find(|s| !(**s > 0.0 && s.is_finite())) {
        return Err(Error::InvalidSizes(format!(
            "size {} for {} is not positive",
            bad, part
        )));
    }

    let mut ordered = sizes.to_vec();
    ordered.sort_by(|a, b| b.total_cmp(a));
    let primary = ordered[0];
    let secondary = (ordered.len() > 1).then(|| ordered[ordered.len() - 1]);

    let candidates = catalog.nearest_size(part, primary);
    let best = candidates.into_iter().min_by(|a, b| {
        let rank = |e: &CatalogEntry| {
            let secondary_gap = match secondary {
                Some(s) => (e.secondary_size.unwrap_or(e.size) - s).abs(),
                None => 0.0,
            };
            (system_fit(system_hint, e.system), secondary_gap)
        };
        let (fa, ga) = rank(a);
        let (fb, gb) = rank(b);
        fa.cmp(&fb)
            .then(ga.total_cmp(&gb))
            .then_with(|| a.key.cmp(&b.key))
    });

    let Some(entry) = best else {
        tracing::warn!(part = %part, size = primary, "no catalog entry for part");
        return Ok(FittingSelection {
            part,
            sizes: ordered,
            resolved_key: None,
            catalog_size: None,
            match_kind: MatchKind::Unresolved,
        });
    };

    let primary_exact = (entry.size - primary).abs() <= SIZE_MATCH_TOLERANCE;
    let secondary_exact = secondary.map_or(true, |s| {
        (entry.secondary_size.unwrap_or(entry.size) - s).abs() <= SIZE_MATCH_TOLERANCE
    });
    let match_kind = if primary_exact && secondary_exact {
        MatchKind::Exact
    } else {
        MatchKind::NearestSize
    };

    Ok(FittingSelection {
        part,
        sizes: ordered,
        resolved_key: Some(entry.key.clone()),
        catalog_size: Some(entry.size),
        match_kind,
    })
}

/// 0 for a rated match, 1 for an unrated entry or no hint, 2 for a mismatch
fn system_fit(hint: Option<SystemType>, rated: Option<SystemType>) -> u8 {
    match (hint, rated) {
        (Some(hint), Some(rated)) if hint == rated => 0,
        (Some(_), Some(_)) => 2,
        _ => 1,
    }
}
