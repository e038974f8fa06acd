// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Underground checks for buried utility runs
//!
//! Three independent analyses over classified elements:
//!
//! - [`analyze_depths`]: burial depth below a [`GroundSurface`](pipescan_geometry::GroundSurface)
//!   against per-system minimums
//! - [`group_corridors`]: proximity grouping with a shared alignment and width
//! - [`detect_clashes`]: clearance-matrix checks between existing and proposed runs
//!
//! [`analyze_underground`] runs all three concurrently.

pub mod clash;
pub mod corridor;
pub mod depth;
pub mod error;

pub use clash::{
    detect_clashes, severity_for, Clash, ClashConfig, ClashType, ClearanceMatrix,
    ClearanceMeasure, ClearanceRule, Severity,
};
pub use corridor::{group_corridors, Corridor, CorridorConfig};
pub use depth::{
    analyze_depths, DepthConfig, DepthReport, DepthRequirements, DepthViolation, ElementDepth,
};
pub use error::{Error, Result};

use pipescan_core::UtilityElement;
use pipescan_geometry::GroundSurface;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndergroundConfig {
    pub depth: DepthConfig,
    pub corridor: CorridorConfig,
    pub clash: ClashConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UndergroundReport {
    pub depth: DepthReport,
    pub corridors: Vec<Corridor>,
    pub clashes: Vec<Clash>,
}

impl UndergroundReport {
    /// Depth violations plus clashes
    pub fn issue_count(&self) -> usize {
        self.depth.violations.len() + self.clashes.len()
    }
}

/// Depth and corridors over `proposed`, clashes of `proposed` against `existing`
///
/// Ids within `proposed` must be unique. Any failing check fails the call.
pub fn analyze_underground<G: GroundSurface + ?Sized>(
    existing: &[UtilityElement],
    proposed: &[UtilityElement],
    ground: &G,
    config: &UndergroundConfig,
) -> Result<UndergroundReport> {
    let mut seen = FxHashSet::default();
    if let Some(dup) = proposed.iter().find(|e| !seen.insert(e.id)) {
        return Err(Error::DuplicateId(dup.id));
    }

    let (depth, (corridors, clashes)) = rayon::join(
        || analyze_depths(proposed, ground, &config.depth),
        || {
            rayon::join(
                || group_corridors(proposed, &config.corridor),
                || detect_clashes(existing, proposed, &config.clash),
            )
        },
    );

    let report = UndergroundReport {
        depth: depth?,
        corridors: corridors?,
        clashes: clashes?,
    };
    tracing::info!(
        elements = proposed.len(),
        existing = existing.len(),
        depth_violations = report.depth.violations.len(),
        corridors = report.corridors.len(),
        clashes = report.clashes.len(),
        "underground analysis complete"
    );
    Ok(report)
}
