// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Junction and batch scenarios across the network crate

use approx::assert_relative_eq;
use pipescan_core::{Centerline, ElementId, Point3D, SystemType, UtilityElement, UtilityType};
use pipescan_network::{
    analyze_intersections, create_network, CatalogEntry, FittingCatalog, FittingTopology,
    IntersectionConfig, ItemErrorKind, NetworkSettings, PartKind, RecordingSink,
};

fn pipe(id: u64, points: &[[f64; 3]], diameter: f64) -> UtilityElement {
    UtilityElement::new(
        ElementId(id),
        Centerline::new(points.iter().map(|&p| Point3D::from(p))).unwrap(),
        diameter,
        UtilityType::Pipe,
    )
    .unwrap()
}

/// Direction at `deg` degrees from +x in plan
fn towards(deg: f64, length: f64) -> [f64; 3] {
    let r = deg.to_radians();
    [length * r.cos(), length * r.sin(), 0.0]
}

#[test]
fn two_pipes_near_right_angle_make_an_elbow() {
    for crossing in [88.0, 90.0, 92.0] {
        let elements = vec![
            pipe(1, &[[-10.0, 0.0, 0.0], [0.0, 0.0, 0.0]], 0.5),
            pipe(2, &[[0.0, 0.0, 0.0], towards(crossing, 10.0)], 0.6),
        ];
        let found = analyze_intersections(&elements, &IntersectionConfig::default()).unwrap();
        assert_eq!(found.len(), 1, "crossing {crossing}");
        assert_eq!(found[0].topology, FittingTopology::Elbow);
        assert_relative_eq!(found[0].angle_deg, 90.0, epsilon = 2.0 + 1e-9);
    }
}

#[test]
fn three_way_junction_tee_or_wye() {
    let tee = vec![
        pipe(1, &[[-10.0, 0.0, 0.0], [0.0, 0.0, 0.0]], 0.5),
        pipe(2, &[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]], 0.5),
        pipe(3, &[[0.0, 0.0, 0.0], towards(90.0, 10.0)], 0.5),
    ];
    let found = analyze_intersections(&tee, &IntersectionConfig::default()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].participants.len(), 3);
    assert_eq!(found[0].topology, FittingTopology::Tee);

    let wye: Vec<UtilityElement> = vec![
        pipe(1, &[[-10.0, 0.0, 0.0], [0.0, 0.0, 0.0]], 0.5),
        pipe(2, &[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]], 0.5),
        pipe(3, &[[0.0, 0.0, 0.0], towards(45.0, 10.0)], 0.5),
    ]
    .into_iter()
    .map(|e| e.with_system(SystemType::Sanitary))
    .collect();
    let found = analyze_intersections(&wye, &IntersectionConfig::default()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].topology, FittingTopology::Wye);

    // Same 45° geometry on a pressurized system stays a tee
    let pressurized: Vec<UtilityElement> = wye
        .into_iter()
        .map(|e| e.with_system(SystemType::Water))
        .collect();
    let found = analyze_intersections(&pressurized, &IntersectionConfig::default()).unwrap();
    assert_eq!(found[0].topology, FittingTopology::Tee);
}

#[test]
fn intersections_do_not_depend_on_input_order() {
    let elements = vec![
        pipe(1, &[[-10.0, 0.0, 0.0], [0.0, 0.0, 0.0]], 0.5),
        pipe(2, &[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]], 0.5),
        pipe(3, &[[0.0, 0.0, 0.0], [0.0, 10.0, 0.0]], 0.5),
        pipe(4, &[[10.0, 0.1, 0.0], [10.0, -10.0, 0.0]], 0.4),
        pipe(5, &[[0.0, 10.0, 0.0], [0.0, 20.0, 0.0]], 0.3),
        pipe(6, &[[30.0, 30.0, 0.0], [40.0, 30.0, 0.0]], 0.3),
    ];
    let config = IntersectionConfig::default();
    let summary = |set: &[UtilityElement]| {
        analyze_intersections(set, &config)
            .unwrap()
            .into_iter()
            .map(|i| (i.participants, i.topology))
            .collect::<Vec<_>>()
    };
    let reference = summary(&elements);
    assert_eq!(reference.len(), 3);

    let mut permuted = elements.clone();
    for shift in 1..elements.len() {
        permuted.rotate_left(1);
        assert_eq!(summary(&permuted), reference, "rotation {shift}");
    }
    permuted.reverse();
    assert_eq!(summary(&permuted), reference);
}

#[test]
fn batch_with_one_unresolvable_item() {
    // Segments only: a run with a bend cannot get an elbow
    let catalog = FittingCatalog::new(vec![
        CatalogEntry::new("SEG-6", PartKind::Segment, 0.5),
        CatalogEntry::new("SEG-8", PartKind::Segment, 8.0 / 12.0),
    ])
    .unwrap();

    let mut elements = Vec::new();
    for i in 0..10u64 {
        let y = i as f64 * 20.0;
        let element = if i == 4 {
            pipe(i + 1, &[[0.0, y, 0.0], [30.0, y, 0.0], [30.0, y + 10.0, 0.0]], 0.5)
        } else {
            pipe(i + 1, &[[0.0, y, 0.0], [30.0, y, 0.0]], 0.5)
        };
        elements.push(element);
    }

    let mut sink = RecordingSink::new();
    let result =
        create_network(&elements, &NetworkSettings::default(), &catalog, &mut sink).unwrap();

    assert_eq!(result.created_elements.len(), 9);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].index, 4);
    assert_eq!(result.errors[0].element_id, ElementId(5));
    assert_eq!(result.errors[0].kind, ItemErrorKind::UnresolvedFitting);
    assert!(result.has_errors());
    assert_eq!(sink.runs.len(), 9);
    assert!(result.created_elements.iter().all(|r| r.index != 4));
    assert_eq!(result.network_count, 9);
}

#[test]
fn sink_failure_does_not_abort_batch() {
    let elements: Vec<UtilityElement> = (0..3u64)
        .map(|i| pipe(i + 1, &[[0.0, i as f64 * 5.0, 0.0], [10.0, i as f64 * 5.0, 0.0]], 0.5))
        .collect();
    let mut sink = RecordingSink::new().fail_run_for(ElementId(2));
    let result = create_network(
        &elements,
        &NetworkSettings::default(),
        &FittingCatalog::standard(),
        &mut sink,
    )
    .unwrap();
    assert_eq!(result.created_elements.len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ItemErrorKind::Sink);
    assert_eq!(result.errors[0].index, 1);
}
