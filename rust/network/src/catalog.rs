// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fitting and segment catalog
//!
//! Entries are indexed per part kind in a vector sorted by an integer size
//! key, so nearest-size lookup is a binary search after an `O(n log n)`
//! build. A [`CatalogCache`] shares one immutable snapshot across a
//! session; rebuilding swaps the snapshot under the write lock.

use crate::error::{Error, Result};
use crate::intersection::FittingTopology;
use pipescan_core::SystemType;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Size keys are thousandths of a length unit
const SIZE_KEY_SCALE: f64 = 1000.0;

/// Sizes closer than this are the same nominal size
pub const SIZE_MATCH_TOLERANCE: f64 = 1e-3;

/// What a catalog entry can materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartKind {
    /// Straight run (pipe, duct, conduit, tray)
    Segment,
    Fitting(FittingTopology),
}

impl std::fmt::Display for PartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartKind::Segment => f.write_str("Segment"),
            PartKind::Fitting(topology) => write!(f, "{} fitting", topology),
        }
    }
}

/// One catalog part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub part: PartKind,
    /// Primary nominal size (diameter, in the project length unit)
    pub size: f64,
    /// Branch/outlet size for reducing fittings
    #[serde(default)]
    pub secondary_size: Option<f64>,
    /// System the part is rated for; `None` fits any system
    #[serde(default)]
    pub system: Option<SystemType>,
}

impl CatalogEntry {
    pub fn new(key: impl Into<String>, part: PartKind, size: f64) -> Self {
        Self {
            key: key.into(),
            part,
            size,
            secondary_size: None,
            system: None,
        }
    }

    pub fn with_secondary(mut self, size: f64) -> Self {
        self.secondary_size = Some(size);
        self
    }

    pub fn with_system(mut self, system: SystemType) -> Self {
        self.system = Some(system);
        self
    }

    fn validate(&self) -> Result<()> {
        let bad = |reason: String| Error::InvalidCatalogEntry {
            key: self.key.clone(),
            reason,
        };
        if !(self.size > 0.0 && self.size.is_finite()) {
            return Err(bad(format!("size must be positive, got {}", self.size)));
        }
        if let Some(secondary) = self.secondary_size {
            if !(secondary > 0.0 && secondary.is_finite()) {
                return Err(bad(format!("secondary size must be positive, got {}", secondary)));
            }
        }
        Ok(())
    }
}

pub(crate) fn size_key(size: f64) -> i64 {
    (size * SIZE_KEY_SCALE).round() as i64
}

/// Immutable catalog snapshot
#[derive(Debug, Clone, Default)]
pub struct FittingCatalog {
    entries: Vec<CatalogEntry>,
    /// Per part kind: (size key, entry index), sorted
    index: FxHashMap<PartKind, Vec<(i64, usize)>>,
}

impl FittingCatalog {
    /// Build a catalog, validating every entry
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut index: FxHashMap<PartKind, Vec<(i64, usize)>> = FxHashMap::default();
        for (i, entry) in entries.iter().enumerate() {
            entry.validate()?;
            index
                .entry(entry.part)
                .or_default()
                .push((size_key(entry.size), i));
        }
        for list in index.values_mut() {
            list.sort_unstable();
        }
        Ok(Self { entries, index })
    }

    /// Load from a JSON array of entries
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Nominal sizes 0.5" to 48" for segments and every fitting topology.
    ///
    /// Sizes are in feet. Reducers step down one nominal size; tees, wyes
    /// and crosses are equal-outlet.
    pub fn standard() -> Self {
        const NOMINAL_INCHES: [f64; 21] = [
            0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 2.5, 3.0, 4.0, 6.0, 8.0, 10.0, 12.0, 15.0, 18.0, 21.0,
            24.0, 30.0, 36.0, 42.0, 48.0,
        ];
        let mut entries = Vec::new();
        for (i, inches) in NOMINAL_INCHES.iter().enumerate() {
            let size = inches / 12.0;
            entries.push(CatalogEntry::new(
                format!("SEG-{}", inches),
                PartKind::Segment,
                size,
            ));
            for topology in [
                FittingTopology::Elbow,
                FittingTopology::Tee,
                FittingTopology::Wye,
                FittingTopology::Cross,
            ] {
                entries.push(CatalogEntry::new(
                    format!("{}-{}", topology.as_str().to_uppercase(), inches),
                    PartKind::Fitting(topology),
                    size,
                ));
            }
            if i > 0 {
                let smaller = NOMINAL_INCHES[i - 1];
                entries.push(
                    CatalogEntry::new(
                        format!("REDUCER-{}x{}", inches, smaller),
                        PartKind::Fitting(FittingTopology::Reducer),
                        size,
                    )
                    .with_secondary(smaller / 12.0),
                );
            }
        }
        // Every entry above is valid by construction
        Self::new(entries).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn has_part(&self, part: PartKind) -> bool {
        self.index.get(&part).map_or(false, |list| !list.is_empty())
    }

    /// Entries of `part` at the nominal size closest to `size`.
    ///
    /// Equal distances prefer the smaller size. Returns an empty slice when
    /// the catalog has no entry of this kind.
    pub fn nearest_size(&self, part: PartKind, size: f64) -> Vec<&CatalogEntry> {
        let Some(list) = self.index.get(&part).filter(|l| !l.is_empty()) else {
            return Vec::new();
        };
        let target = size_key(size);
        let pos = list.partition_point(|&(key, _)| key < target);

        let chosen_key = match (pos.checked_sub(1).map(|p| list[p].0), list.get(pos).map(|e| e.0)) {
            (Some(below), Some(above)) => {
                let d_below = (size - self.entries[self.first_index(list, below)].size).abs();
                let d_above = (self.entries[self.first_index(list, above)].size - size).abs();
                if d_above < d_below {
                    above
                } else {
                    below
                }
            }
            (Some(below), None) => below,
            (None, Some(above)) => above,
            (None, None) => return Vec::new(),
        };

        let start = list.partition_point(|&(key, _)| key < chosen_key);
        let end = list.partition_point(|&(key, _)| key <= chosen_key);
        list[start..end].iter().map(|&(_, i)| &self.entries[i]).collect()
    }

    fn first_index(&self, list: &[(i64, usize)], key: i64) -> usize {
        let pos = list.partition_point(|&(k, _)| k < key);
        list[pos].1
    }
}

/// Session-wide shared catalog
///
/// Readers take a cheap [`Arc`] snapshot and resolve without holding the
/// lock. Replacing the catalog waits for the write lock, so no resolution
/// observes a half-built catalog.
#[derive(Debug, Default)]
pub struct CatalogCache {
    current: RwLock<Arc<FittingCatalog>>,
}

impl CatalogCache {
    pub fn new(catalog: FittingCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<FittingCatalog> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, catalog: FittingCatalog) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(catalog);
    }

    /// Rebuild from entries; the previous snapshot stays if the build fails
    pub fn rebuild(&self, entries: Vec<CatalogEntry>) -> Result<()> {
        let catalog = FittingCatalog::new(entries)?;
        self.replace(catalog);
        tracing::info!("fitting catalog rebuilt");
        Ok(())
    }
}
