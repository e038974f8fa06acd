// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clearance clash detection between existing and proposed utilities
//!
//! For each (existing, proposed) pair the required clearance comes from the
//! [`ClearanceMatrix`] keyed by system type. A clash is emitted only when
//! the actual clearance is below the requirement.

use crate::error::{Error, Result};
use pipescan_core::{ElementId, SystemType, UtilityElement};
use pipescan_geometry::Point3D;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// One symmetric clearance rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClearanceRule {
    pub a: SystemType,
    pub b: SystemType,
    pub clearance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClearanceTable {
    #[serde(default = "fallback_clearance")]
    default_clearance: f64,
    #[serde(default)]
    rules: Vec<ClearanceRule>,
}

fn fallback_clearance() -> f64 {
    2.0
}

/// Symmetric minimum-separation lookup by system type pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClearanceTable", into = "ClearanceTable")]
pub struct ClearanceMatrix {
    default_clearance: f64,
    rules: FxHashMap<(SystemType, SystemType), f64>,
}

impl Default for ClearanceMatrix {
    fn default() -> Self {
        Self::new(fallback_clearance())
    }
}

fn pair_key(a: SystemType, b: SystemType) -> (SystemType, SystemType) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl ClearanceMatrix {
    /// Empty matrix; every pair falls back to `default_clearance`
    pub fn new(default_clearance: f64) -> Self {
        Self {
            default_clearance,
            rules: FxHashMap::default(),
        }
    }

    pub fn with_rule(mut self, a: SystemType, b: SystemType, clearance: f64) -> Self {
        self.set(a, b, clearance);
        self
    }

    pub fn set(&mut self, a: SystemType, b: SystemType, clearance: f64) {
        self.rules.insert(pair_key(a, b), clearance);
    }

    pub fn default_clearance(&self) -> f64 {
        self.default_clearance
    }

    /// Required clearance, and whether it came from the fallback
    pub fn lookup(&self, a: SystemType, b: SystemType) -> (f64, bool) {
        match self.rules.get(&pair_key(a, b)) {
            Some(&clearance) => (clearance, false),
            None => (self.default_clearance, true),
        }
    }

    pub fn required(&self, a: SystemType, b: SystemType) -> f64 {
        self.lookup(a, b).0
    }

    fn validate(&self) -> Result<()> {
        let bad = std::iter::once(self.default_clearance)
            .chain(self.rules.values().copied())
            .find(|c| !(*c >= 0.0 && c.is_finite()));
        match bad {
            Some(c) => Err(Error::InvalidConfig(format!(
                "clearance must be non-negative, got {}",
                c
            ))),
            None => Ok(()),
        }
    }
}

impl From<ClearanceTable> for ClearanceMatrix {
    fn from(table: ClearanceTable) -> Self {
        let mut matrix = ClearanceMatrix::new(table.default_clearance);
        for rule in table.rules {
            matrix.set(rule.a, rule.b, rule.clearance);
        }
        matrix
    }
}

impl From<ClearanceMatrix> for ClearanceTable {
    fn from(matrix: ClearanceMatrix) -> Self {
        let mut rules: Vec<ClearanceRule> = matrix
            .rules
            .into_iter()
            .map(|((a, b), clearance)| ClearanceRule { a, b, clearance })
            .collect();
        rules.sort_by_key(|r| (r.a, r.b));
        ClearanceTable {
            default_clearance: matrix.default_clearance,
            rules,
        }
    }
}

/// How actual clearance is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClearanceMeasure {
    /// Centerline to centerline
    #[default]
    Centerline,
    /// Outer wall to outer wall (centerline distance minus both radii)
    OuterSurface,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClashConfig {
    pub matrix: ClearanceMatrix,
    /// Pairs that are always critical regardless of distance
    pub hazardous_pairs: Vec<(SystemType, SystemType)>,
    pub measure: ClearanceMeasure,
    /// Clearances below this are Major
    pub major_below: f64,
    /// Clearances below this are Minor; anything else is a Warning
    pub minor_below: f64,
}

impl Default for ClashConfig {
    fn default() -> Self {
        Self {
            matrix: ClearanceMatrix::default(),
            hazardous_pairs: vec![
                (SystemType::Gas, SystemType::Electrical),
                (SystemType::Water, SystemType::Sanitary),
            ],
            measure: ClearanceMeasure::Centerline,
            major_below: 1.0,
            minor_below: 2.0,
        }
    }
}

impl ClashConfig {
    pub fn is_hazardous(&self, a: SystemType, b: SystemType) -> bool {
        let key = pair_key(a, b);
        self.hazardous_pairs
            .iter()
            .any(|&(x, y)| pair_key(x, y) == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClashType {
    /// Runs touch or overlap
    Hard,
    /// Separation below the requirement
    ClearanceViolation,
    /// Separation below the requirement where the runs cross in plan
    Crossing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clash {
    /// Existing element
    pub a: ElementId,
    /// Proposed element
    pub b: ElementId,
    pub clash_type: ClashType,
    pub required_clearance: f64,
    pub actual_clearance: f64,
    pub location: Point3D,
    pub severity: Severity,
    /// The pair had no rule and the fallback clearance applied
    pub default_clearance_used: bool,
}

/// Severity from the measured clearance and the pair's hazard status
pub fn severity_for(actual: f64, hazardous: bool, config: &ClashConfig) -> Severity {
    if actual <= 0.0 || hazardous {
        Severity::Critical
    } else if actual < config.major_below {
        Severity::Major
    } else if actual < config.minor_below {
        Severity::Minor
    } else {
        Severity::Warning
    }
}

/// Test every (existing, proposed) pair against the clearance matrix
///
/// The two sets are numbered independently, so equal ids on both sides do
/// not mean the same element. Only an element compared with itself (the
/// same slice passed twice) is skipped. Output is sorted by `(a, b)`.
pub fn detect_clashes(
    existing: &[UtilityElement],
    proposed: &[UtilityElement],
    config: &ClashConfig,
) -> Result<Vec<Clash>> {
    config.matrix.validate()?;
    for element in existing.iter().chain(proposed) {
        element.validate()?;
    }

    let mut clashes: Vec<Clash> = existing
        .par_iter()
        .flat_map_iter(|e| {
            proposed
                .iter()
                .filter(move |p| !std::ptr::eq(e, *p))
                .filter_map(move |p| check_pair(e, p, config))
        })
        .collect();
    clashes.sort_by_key(|c| (c.a, c.b));

    let unregistered: FxHashSet<(SystemType, SystemType)> = existing
        .iter()
        .flat_map(|e| {
            proposed
                .iter()
                .map(move |p| pair_key(e.system_type, p.system_type))
        })
        .filter(|&(a, b)| config.matrix.lookup(a, b).1)
        .collect();
    let mut unregistered: Vec<_> = unregistered.into_iter().collect();
    unregistered.sort();
    for (a, b) in unregistered {
        tracing::warn!(
            a = %a,
            b = %b,
            clearance = config.matrix.default_clearance(),
            "no clearance rule for pair, using default"
        );
    }

    tracing::debug!(
        existing = existing.len(),
        proposed = proposed.len(),
        clashes = clashes.len(),
        "clash detection complete"
    );
    Ok(clashes)
}

/// Clash for one pair, if its clearance falls short
///
/// Overlap is `Hard`. Otherwise a pair that crosses in plan is typed
/// `Crossing` even when it is also a clearance shortfall; `Crossing` takes
/// precedence over `ClearanceViolation`.
fn check_pair(
    existing: &UtilityElement,
    proposed: &UtilityElement,
    config: &ClashConfig,
) -> Option<Clash> {
    let (required, default_used) = config
        .matrix
        .lookup(existing.system_type, proposed.system_type);

    // Cheap reject: bounds farther apart than the requirement
    let reach = required
        + match config.measure {
            ClearanceMeasure::Centerline => 0.0,
            ClearanceMeasure::OuterSurface => existing.radius() + proposed.radius(),
        };
    if existing.centerline.bounds().distance_to(&proposed.centerline.bounds()) >= reach {
        return None;
    }

    let approach = existing.centerline.min_distance(&proposed.centerline);
    let actual = match config.measure {
        ClearanceMeasure::Centerline => approach.distance,
        ClearanceMeasure::OuterSurface => {
            approach.distance - existing.radius() - proposed.radius()
        }
    };
    if actual >= required {
        return None;
    }

    let clash_type = if actual <= 0.0 {
        ClashType::Hard
    } else if existing.centerline.crosses_in_plan(&proposed.centerline) {
        ClashType::Crossing
    } else {
        ClashType::ClearanceViolation
    };
    let hazardous = config.is_hazardous(existing.system_type, proposed.system_type);

    Some(Clash {
        a: existing.id,
        b: proposed.id,
        clash_type,
        required_clearance: required,
        actual_clearance: actual,
        location: approach.midpoint(),
        severity: severity_for(actual, hazardous, config),
        default_clearance_used: default_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pipescan_core::{Centerline, UtilityType};

    fn along_x(id: u64, y: f64, z: f64, system: SystemType) -> UtilityElement {
        UtilityElement::new(
            ElementId(id),
            Centerline::line(Point3D::new(0.0, y, z), Point3D::new(20.0, y, z)).unwrap(),
            0.5,
            UtilityType::Pipe,
        )
        .unwrap()
        .with_system(system)
    }

    #[test]
    fn test_matrix_symmetric_with_default() {
        let matrix =
            ClearanceMatrix::new(2.0).with_rule(SystemType::Gas, SystemType::Electrical, 12.0);
        assert_eq!(matrix.lookup(SystemType::Electrical, SystemType::Gas), (12.0, false));
        assert_eq!(matrix.lookup(SystemType::Water, SystemType::Storm), (2.0, true));
    }

    #[test]
    fn test_matrix_json_round_trip() {
        let matrix =
            ClearanceMatrix::new(2.5).with_rule(SystemType::Water, SystemType::Sanitary, 10.0);
        let json = serde_json::to_string(&matrix).unwrap();
        let back: ClearanceMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, matrix);
    }

    #[test]
    fn test_hazardous_pair_is_critical_regardless_of_distance() {
        let config = ClashConfig {
            matrix: ClearanceMatrix::default().with_rule(
                SystemType::Gas,
                SystemType::Electrical,
                12.0,
            ),
            ..ClashConfig::default()
        };
        let existing = [along_x(1, 0.0, -4.0, SystemType::Gas)];
        let proposed = [along_x(7, 1.5, -4.0, SystemType::Electrical)];
        let clashes = detect_clashes(&existing, &proposed, &config).unwrap();
        assert_eq!(clashes.len(), 1);
        let clash = &clashes[0];
        assert_eq!((clash.a, clash.b), (ElementId(1), ElementId(7)));
        assert_eq!(clash.clash_type, ClashType::ClearanceViolation);
        assert_eq!(clash.severity, Severity::Critical);
        assert_relative_eq!(clash.required_clearance, 12.0);
        assert_relative_eq!(clash.actual_clearance, 1.5, epsilon = 1e-9);
        assert!(!clash.default_clearance_used);
    }

    #[test]
    fn test_clearance_monotonicity() {
        let config = ClashConfig {
            matrix: ClearanceMatrix::new(3.0),
            ..ClashConfig::default()
        };
        let existing = [along_x(1, 0.0, -5.0, SystemType::Storm)];
        let mut last_severity = Severity::Critical;
        for (offset, expected) in [
            (0.5, Some(Severity::Major)),
            (1.5, Some(Severity::Minor)),
            (2.5, Some(Severity::Warning)),
            (3.0, None),
            (4.0, None),
        ] {
            let proposed = [along_x(2, offset, -5.0, SystemType::Telecom)];
            let clashes = detect_clashes(&existing, &proposed, &config).unwrap();
            match expected {
                Some(severity) => {
                    assert_eq!(clashes.len(), 1, "offset {offset}");
                    assert_eq!(clashes[0].severity, severity);
                    assert!(clashes[0].severity <= last_severity);
                    assert_eq!(clashes[0].clash_type, ClashType::ClearanceViolation);
                    assert!(clashes[0].actual_clearance < clashes[0].required_clearance);
                    assert!(clashes[0].default_clearance_used);
                    last_severity = severity;
                }
                None => assert!(clashes.is_empty(), "offset {offset}"),
            }
        }
    }

    #[test]
    fn test_negative_clearance_is_hard_and_critical() {
        let config = ClashConfig {
            measure: ClearanceMeasure::OuterSurface,
            ..ClashConfig::default()
        };
        // Centerlines 0.3 apart, radii 0.25 each: walls overlap by 0.2
        let existing = [along_x(1, 0.0, -5.0, SystemType::Storm)];
        let proposed = [along_x(2, 0.3, -5.0, SystemType::Telecom)];
        let clashes = detect_clashes(&existing, &proposed, &config).unwrap();
        assert_eq!(clashes.len(), 1);
        assert_eq!(clashes[0].clash_type, ClashType::Hard);
        assert_eq!(clashes[0].severity, Severity::Critical);
        assert_relative_eq!(clashes[0].actual_clearance, -0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_crossing_in_plan() {
        let existing = [along_x(1, 0.0, -5.0, SystemType::Storm)];
        let crossing = UtilityElement::new(
            ElementId(2),
            Centerline::line(
                Point3D::new(10.0, -10.0, -6.0),
                Point3D::new(10.0, 10.0, -6.0),
            )
            .unwrap(),
            0.5,
            UtilityType::Pipe,
        )
        .unwrap()
        .with_system(SystemType::Water);
        let clashes = detect_clashes(&existing, &[crossing], &ClashConfig::default()).unwrap();
        assert_eq!(clashes.len(), 1);
        assert_eq!(clashes[0].clash_type, ClashType::Crossing);
        assert_relative_eq!(clashes[0].actual_clearance, 1.0, epsilon = 1e-9);
        assert_relative_eq!(clashes[0].location.x, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shared_id_across_sets_still_checked() {
        let existing = [along_x(1, 0.0, -4.0, SystemType::Gas)];
        let proposed = [along_x(1, 1.0, -4.0, SystemType::Electrical)];
        let clashes = detect_clashes(&existing, &proposed, &ClashConfig::default()).unwrap();
        assert_eq!(clashes.len(), 1);
        assert_eq!((clashes[0].a, clashes[0].b), (ElementId(1), ElementId(1)));
        assert_eq!(clashes[0].severity, Severity::Critical);
        assert_relative_eq!(clashes[0].actual_clearance, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_element_not_compared_with_itself() {
        let elements = [
            along_x(1, 0.0, -5.0, SystemType::Water),
            along_x(2, 1.0, -5.0, SystemType::Water),
        ];
        let clashes = detect_clashes(&elements, &elements, &ClashConfig::default()).unwrap();
        let pairs: Vec<_> = clashes.iter().map(|c| (c.a, c.b)).collect();
        assert_eq!(
            pairs,
            vec![(ElementId(1), ElementId(2)), (ElementId(2), ElementId(1))]
        );
    }
}
