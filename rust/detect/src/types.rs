// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration and intermediate types for the detection stages

use crate::error::{Error, Result};
use pipescan_core::PrimitiveGeometry;
use serde::{Deserialize, Serialize};

/// A candidate primitive returned by a detection capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub geometry: PrimitiveGeometry,
    /// Capability-reported confidence. Untrusted: checked before use.
    pub confidence: f64,
}

impl Candidate {
    pub fn new(geometry: PrimitiveGeometry, confidence: f64) -> Self {
        Self {
            geometry,
            confidence,
        }
    }
}

/// Configuration for the primitive detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Candidates below this confidence are discarded
    pub confidence_threshold: f64,
    /// Flood-fill linking radius between neighbouring points
    pub cluster_radius: f64,
    /// Clusters with fewer points are discarded as noise
    pub min_cluster_points: usize,
    /// Smallest radius accepted as pipe-like
    pub min_radius: f64,
    /// Largest radius accepted as pipe-like (bigger is structural)
    pub max_radius: f64,
    /// Cylinders must satisfy `length / (2 * radius) > min_aspect_ratio`
    pub min_aspect_ratio: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            cluster_radius: 0.5,
            min_cluster_points: 20,
            min_radius: 0.03,
            max_radius: 3.0,
            min_aspect_ratio: 3.0,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::InvalidConfig(format!(
                "confidence_threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if !(self.cluster_radius > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "cluster_radius must be positive, got {}",
                self.cluster_radius
            )));
        }
        if !(self.min_radius > 0.0 && self.min_radius <= self.max_radius) {
            return Err(Error::InvalidConfig(format!(
                "radius band [{}, {}] is empty",
                self.min_radius, self.max_radius
            )));
        }
        Ok(())
    }
}

/// Weights of the classification consistency score.
///
/// The score is a weighted mean, so the weights only matter relative to
/// each other. These are policy values, not derived constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyWeights {
    /// Long, regular runs are more trustworthy than short stubs
    pub regularity: f64,
    /// Utilities run close to horizontal or vertical
    pub orientation: f64,
    /// Small conduits usually travel in parallel bundles
    pub bundle: f64,
}

impl Default for ConsistencyWeights {
    fn default() -> Self {
        Self {
            regularity: 0.5,
            orientation: 0.25,
            bundle: 0.25,
        }
    }
}

/// Configuration for the utility classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Round sections at or below this diameter are conduits
    pub conduit_max_diameter: f64,
    /// Box sections with width/height at or above this are cable trays
    pub tray_min_aspect: f64,
    /// Cable trays are flat: height at or below this
    pub tray_max_height: f64,
    /// Max centerline distance between bundled conduits
    pub bundle_distance: f64,
    /// Max angle between bundled conduits (degrees)
    pub bundle_angle_deg: f64,
    /// Bundle score of a small round run with no parallel neighbour
    pub lone_small_pipe_score: f64,
    /// Aspect ratio at which the regularity score saturates
    pub regular_aspect_ratio: f64,
    /// Angle from horizontal/vertical that still counts as aligned (degrees)
    pub orientation_tolerance_deg: f64,
    /// Grade range (rise/run) treated as a gravity-flow slope
    pub gravity_min_grade: f64,
    pub gravity_max_grade: f64,
    /// Sloped pipes at or above this diameter are storm, below are sanitary
    pub storm_min_diameter: f64,
    /// Pipe diameter bands for material inference
    pub copper_max_diameter: f64,
    pub pvc_max_diameter: f64,
    pub ductile_iron_max_diameter: f64,
    /// Planes within this angle of vertical/horizontal (degrees)
    pub plane_tolerance_deg: f64,
    /// Vertical planes with both extents at or below this are columns
    pub column_max_extent: f64,
    /// Consistency applied to beam candidates
    pub beam_consistency: f64,
    /// Beam candidates below this combined confidence are rejected
    pub min_beam_confidence: f64,
    pub weights: ConsistencyWeights,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            conduit_max_diameter: 0.35,
            tray_min_aspect: 3.0,
            tray_max_height: 0.5,
            bundle_distance: 1.0,
            bundle_angle_deg: 10.0,
            lone_small_pipe_score: 0.5,
            regular_aspect_ratio: 10.0,
            orientation_tolerance_deg: 10.0,
            gravity_min_grade: 0.005,
            gravity_max_grade: 0.10,
            storm_min_diameter: 1.0,
            copper_max_diameter: 0.25,
            pvc_max_diameter: 1.5,
            ductile_iron_max_diameter: 4.0,
            plane_tolerance_deg: 15.0,
            column_max_extent: 2.0,
            beam_consistency: 0.6,
            min_beam_confidence: 0.5,
            weights: ConsistencyWeights::default(),
        }
    }
}

/// Configuration for the segment merger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Max angle between run directions (degrees)
    pub angle_tolerance_deg: f64,
    /// Max distance between nearest endpoints (scan gaps)
    pub gap_tolerance: f64,
    /// Max perpendicular offset of the nearest endpoint from the other run's axis
    pub lateral_tolerance: f64,
    /// Max relative diameter difference; larger differences are size transitions
    pub diameter_tolerance: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            angle_tolerance_deg: 5.0,
            gap_tolerance: 1.0,
            lateral_tolerance: 0.25,
            diameter_tolerance: 0.1,
        }
    }
}
