// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Combined underground analysis over a small site

use approx::assert_relative_eq;
use pipescan_core::{Centerline, ElementId, Point3D, SystemType, UtilityElement, UtilityType};
use pipescan_geometry::{FlatSurface, GroundSurface};
use pipescan_underground::{
    analyze_underground, ClashType, ClearanceMatrix, Error, Severity, UndergroundConfig,
};

fn run(id: u64, from: [f64; 3], to: [f64; 3], diameter: f64, system: SystemType) -> UtilityElement {
    UtilityElement::new(
        ElementId(id),
        Centerline::line(Point3D::from(from), Point3D::from(to)).unwrap(),
        diameter,
        UtilityType::Pipe,
    )
    .unwrap()
    .with_system(system)
}

struct NoSurvey;

impl GroundSurface for NoSurvey {
    fn elevation_at(&self, _x: f64, _y: f64) -> Option<f64> {
        None
    }
}

fn site() -> (Vec<UtilityElement>, Vec<UtilityElement>) {
    let existing = vec![
        run(100, [0.0, -3.0, -4.0], [80.0, -3.0, -4.0], 0.33, SystemType::Gas),
        run(101, [40.0, -40.0, -8.0], [40.0, 40.0, -8.0], 1.5, SystemType::Storm),
        run(102, [0.0, 3.5, -4.5], [80.0, 3.5, -4.5], 0.25, SystemType::Electrical),
    ];
    let proposed = vec![
        // Sanitary too shallow (needs 6)
        run(1, [0.0, 0.0, -5.0], [80.0, 0.0, -5.0], 0.67, SystemType::Sanitary),
        // Water next to the sanitary main, deep enough
        run(2, [0.0, 2.0, -4.5], [80.0, 2.0, -4.5], 0.5, SystemType::Water),
        // Telecom far from everything
        run(3, [0.0, 60.0, -2.5], [80.0, 60.0, -2.5], 0.33, SystemType::Telecom),
    ];
    (existing, proposed)
}

#[test]
fn site_analysis_reports_depth_corridors_and_clashes() {
    let (existing, proposed) = site();
    let mut config = UndergroundConfig::default();
    config.clash.matrix = ClearanceMatrix::new(2.0)
        .with_rule(SystemType::Gas, SystemType::Sanitary, 5.0)
        .with_rule(SystemType::Storm, SystemType::Sanitary, 4.0)
        .with_rule(SystemType::Storm, SystemType::Water, 2.0);

    let report =
        analyze_underground(&existing, &proposed, &FlatSurface::new(0.0), &config).unwrap();

    assert_eq!(report.depth.elements.len(), 3);
    assert_eq!(report.depth.violations.len(), 1);
    assert_eq!(report.depth.violations[0].element_id, ElementId(1));
    assert_relative_eq!(report.depth.violations[0].actual_depth, 5.0, epsilon = 1e-9);
    assert_relative_eq!(report.depth.min_depth.unwrap(), 2.5, epsilon = 1e-9);
    assert_relative_eq!(report.depth.max_depth.unwrap(), 5.0, epsilon = 1e-9);

    // Sanitary and water share a corridor; telecom stands alone
    assert_eq!(report.corridors.len(), 2);
    assert_eq!(report.corridors[0].members, vec![ElementId(1), ElementId(2)]);
    assert_eq!(report.corridors[1].members, vec![ElementId(3)]);

    let pairs: Vec<(u64, u64)> = report.clashes.iter().map(|c| (c.a.0, c.b.0)).collect();
    assert_eq!(pairs, vec![(100, 1), (101, 1), (102, 2)]);

    let gas_sanitary = &report.clashes[0];
    assert_eq!(gas_sanitary.clash_type, ClashType::ClearanceViolation);
    assert_relative_eq!(gas_sanitary.actual_clearance, 3.0_f64.hypot(1.0), epsilon = 1e-9);
    assert_eq!(gas_sanitary.severity, Severity::Warning);
    assert!(!gas_sanitary.default_clearance_used);

    let storm_sanitary = &report.clashes[1];
    assert_eq!(storm_sanitary.clash_type, ClashType::Crossing);
    assert_relative_eq!(storm_sanitary.actual_clearance, 3.0, epsilon = 1e-9);
    assert_eq!(storm_sanitary.severity, Severity::Warning);

    let electrical_water = &report.clashes[2];
    assert!(electrical_water.default_clearance_used);
    assert_relative_eq!(electrical_water.actual_clearance, 1.5, epsilon = 1e-9);
    assert_eq!(electrical_water.severity, Severity::Minor);

    // Storm passes 3.5 under the water line against a 2.0 rule
    assert!(report.clashes.iter().all(|c| !(c.a.0 == 101 && c.b.0 == 2)));
    assert_eq!(report.issue_count(), 4);
}

#[test]
fn existing_ids_overlapping_proposed_ids_still_clash() {
    let (mut existing, proposed) = site();
    // Survey records numbered from 1, same as the detected runs
    for (n, element) in existing.iter_mut().enumerate() {
        element.id = ElementId(n as u64 + 1);
    }
    let mut config = UndergroundConfig::default();
    config.clash.matrix = ClearanceMatrix::new(2.0)
        .with_rule(SystemType::Gas, SystemType::Sanitary, 5.0)
        .with_rule(SystemType::Storm, SystemType::Sanitary, 4.0)
        .with_rule(SystemType::Storm, SystemType::Water, 2.0);

    let report =
        analyze_underground(&existing, &proposed, &FlatSurface::new(0.0), &config).unwrap();

    let pairs: Vec<(u64, u64)> = report.clashes.iter().map(|c| (c.a.0, c.b.0)).collect();
    assert_eq!(pairs, vec![(1, 1), (2, 1), (3, 2)]);
    assert_eq!(report.clashes[0].clash_type, ClashType::ClearanceViolation);
    assert_eq!(report.clashes[1].clash_type, ClashType::Crossing);
    assert_eq!(report.clashes[2].severity, Severity::Minor);
}

#[test]
fn hazardous_pair_with_shared_id_is_critical() {
    let existing = [run(1, [0.0, 0.0, -4.0], [20.0, 0.0, -4.0], 0.5, SystemType::Gas)];
    let proposed = [run(1, [0.0, 1.0, -4.0], [20.0, 1.0, -4.0], 0.5, SystemType::Electrical)];

    let report = analyze_underground(
        &existing,
        &proposed,
        &FlatSurface::new(0.0),
        &UndergroundConfig::default(),
    )
    .unwrap();

    assert_eq!(report.clashes.len(), 1);
    assert_eq!(report.clashes[0].severity, Severity::Critical);
    assert_relative_eq!(report.clashes[0].actual_clearance, 1.0, epsilon = 1e-9);
}

#[test]
fn missing_ground_everywhere_fails_the_call() {
    let (existing, proposed) = site();
    let err = analyze_underground(&existing, &proposed, &NoSurvey, &UndergroundConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::NoGroundData { samples } if samples == 60));
}

#[test]
fn duplicate_proposed_ids_rejected() {
    let (existing, mut proposed) = site();
    proposed[2].id = ElementId(1);
    let err = analyze_underground(
        &existing,
        &proposed,
        &FlatSurface::new(0.0),
        &UndergroundConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::DuplicateId(ElementId(1))));
}

#[test]
fn config_deserializes_with_partial_json() {
    let config: UndergroundConfig = serde_json::from_str(
        r#"{
            "clash": {
                "matrix": {
                    "default_clearance": 3.0,
                    "rules": [{ "a": "Gas", "b": "Electrical", "clearance": 12.0 }]
                }
            },
            "depth": { "samples": 8 }
        }"#,
    )
    .unwrap();
    assert_eq!(config.depth.samples, 8);
    assert_relative_eq!(config.depth.requirements.minimum_for(SystemType::Sanitary), 6.0);
    assert_eq!(
        config.clash.matrix.lookup(SystemType::Electrical, SystemType::Gas),
        (12.0, false)
    );
    assert_eq!(config.clash.matrix.lookup(SystemType::Gas, SystemType::Water), (3.0, true));
    assert_relative_eq!(config.corridor.grouping_distance, 5.0);
}
