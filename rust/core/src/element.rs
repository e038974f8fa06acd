// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classified utility elements and their semantic enums.

use crate::error::{Error, Result};
use crate::ids::ElementId;
use pipescan_geometry::{Aabb, Centerline};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// MEP/utility element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UtilityType {
    Pipe,
    Duct,
    Conduit,
    CableTray,
    Unknown,
}

impl UtilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtilityType::Pipe => "Pipe",
            UtilityType::Duct => "Duct",
            UtilityType::Conduit => "Conduit",
            UtilityType::CableTray => "CableTray",
            UtilityType::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for UtilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipe/duct material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Material {
    Pvc,
    Hdpe,
    Steel,
    DuctileIron,
    Concrete,
    Clay,
    Copper,
    #[default]
    Unknown,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Material::Pvc => "PVC",
            Material::Hdpe => "HDPE",
            Material::Steel => "Steel",
            Material::DuctileIron => "DuctileIron",
            Material::Concrete => "Concrete",
            Material::Clay => "Clay",
            Material::Copper => "Copper",
            Material::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service carried by the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum SystemType {
    Sanitary,
    Storm,
    Water,
    Fire,
    Gas,
    Electrical,
    Telecom,
    Hvac,
    Steam,
    #[default]
    Unknown,
}

impl SystemType {
    /// Gravity-flow systems are laid on a grade instead of being pressurized.
    pub fn is_gravity(&self) -> bool {
        matches!(self, SystemType::Sanitary | SystemType::Storm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Sanitary => "Sanitary",
            SystemType::Storm => "Storm",
            SystemType::Water => "Water",
            SystemType::Fire => "Fire",
            SystemType::Gas => "Gas",
            SystemType::Electrical => "Electrical",
            SystemType::Telecom => "Telecom",
            SystemType::Hvac => "HVAC",
            SystemType::Steam => "Steam",
            SystemType::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for SystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, possibly merged run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityElement {
    pub id: ElementId,
    pub centerline: Centerline,
    /// Outside diameter (or equivalent diameter for box sections)
    pub diameter: f64,
    pub utility_type: UtilityType,
    #[serde(default)]
    pub material: Material,
    #[serde(default)]
    pub system_type: SystemType,
    /// Combined confidence (0.0 - 1.0)
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    /// Constituent ids when this element is the result of a merge
    #[serde(default)]
    pub sources: SmallVec<[ElementId; 2]>,
}

fn full_confidence() -> f64 {
    1.0
}

impl UtilityElement {
    /// Create an element with unknown material/system and full confidence.
    pub fn new(
        id: ElementId,
        centerline: Centerline,
        diameter: f64,
        utility_type: UtilityType,
    ) -> Result<Self> {
        let element = Self {
            id,
            centerline,
            diameter,
            utility_type,
            material: Material::Unknown,
            system_type: SystemType::Unknown,
            confidence: 1.0,
            sources: SmallVec::new(),
        };
        element.validate()?;
        Ok(element)
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_system(mut self, system_type: SystemType) -> Self {
        self.system_type = system_type;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Check the element invariants: positive diameter, confidence in [0, 1].
    ///
    /// The centerline is validated by its own constructor.
    pub fn validate(&self) -> Result<()> {
        if !(self.diameter > 0.0 && self.diameter.is_finite()) {
            return Err(Error::InvalidDiameter {
                id: self.id,
                diameter: self.diameter,
            });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidConfidence {
                id: self.id,
                confidence: self.confidence,
            });
        }
        Ok(())
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    pub fn length(&self) -> f64 {
        self.centerline.length()
    }

    /// Centerline bounds grown by the radius
    pub fn bounds(&self) -> Aabb {
        self.centerline.bounds().expanded(self.radius())
    }
}
