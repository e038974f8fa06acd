// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Full pipeline runs over synthetic scans

use approx::assert_relative_eq;
use pipescan_core::{
    Centerline, ElementId, Point3D, PointCloudRegion, SystemType, UtilityElement, UtilityType,
};
use pipescan_detect::{Candidate, CapabilityError, DetectionCapability};
use pipescan_geometry::FlatSurface;
use pipescan_network::{FittingTopology, MatchKind, RecordingSink};
use pipescan_processing::{Error, Pipeline, PipelineConfig};
use pipescan_underground::Severity;

/// Rings of 12 points every 0.25 along a straight run
fn pipe_points(from: [f64; 3], to: [f64; 3], radius: f64) -> Vec<Point3D> {
    let d = [to[0] - from[0], to[1] - from[1], to[2] - from[2]];
    let length = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
    let d = [d[0] / length, d[1] / length, d[2] / length];
    // Runs in these tests are horizontal, so z is perpendicular
    let u = [d[1], -d[0], 0.0];
    let v = [0.0, 0.0, 1.0];

    let rings = (length / 0.25).round() as usize + 1;
    let mut points = Vec::new();
    for i in 0..rings {
        let t = i as f64 * 0.25;
        for k in 0..12 {
            let a = 2.0 * std::f64::consts::PI * k as f64 / 12.0;
            let (c, s) = (radius * a.cos(), radius * a.sin());
            points.push(Point3D::new(
                from[0] + d[0] * t + u[0] * c + v[0] * s,
                from[1] + d[1] * t + u[1] * c + v[1] * s,
                from[2] + d[2] * t + u[2] * c + v[2] * s,
            ));
        }
    }
    points
}

/// A main along x scanned in two pieces, plus a branch along y ending
/// 1.25 short of the main's axis
fn site() -> PointCloudRegion {
    let mut points = pipe_points([0.0, 0.0, -5.0], [10.0, 0.0, -5.0], 0.25);
    points.extend(pipe_points([10.75, 0.0, -5.0], [20.0, 0.0, -5.0], 0.25));
    points.extend(pipe_points([5.0, 1.25, -5.0], [5.0, 10.0, -5.0], 0.25));
    PointCloudRegion::new("site-a", points)
}

fn existing_electrical() -> Vec<UtilityElement> {
    vec![UtilityElement::new(
        ElementId(100),
        Centerline::line(Point3D::new(0.0, -1.5, -5.0), Point3D::new(20.0, -1.5, -5.0)).unwrap(),
        0.25,
        UtilityType::Conduit,
    )
    .unwrap()
    .with_system(SystemType::Electrical)]
}

fn config() -> PipelineConfig {
    PipelineConfig::from_json_str(r#"{ "intersection": { "tolerance": 1.5 } }"#).unwrap()
}

#[test]
fn site_scan_end_to_end() {
    let pipeline = Pipeline::heuristic(config()).unwrap();
    let mut sink = RecordingSink::new();
    let report = pipeline
        .run(&site(), &FlatSurface::new(0.0), &existing_electrical(), &mut sink)
        .unwrap();

    assert_eq!(report.region, "site-a");
    assert_eq!(report.summary.primitives, 3);
    assert_eq!(report.summary.utilities.get(&UtilityType::Pipe), Some(&3));
    assert!(report.summary.rejected.is_empty());

    // The two scanned pieces of the main merge into one run
    let ids: Vec<ElementId> = report.elements.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![ElementId(1), ElementId(3)]);
    let main = &report.elements[0];
    assert_eq!(main.sources.as_slice(), &[ElementId(1), ElementId(2)]);
    assert_relative_eq!(main.length(), 20.0, epsilon = 1e-6);
    assert_relative_eq!(main.diameter, 0.5, epsilon = 1e-6);
    assert_eq!(main.system_type, SystemType::Water);

    assert_eq!(report.intersections.len(), 1);
    let junction = &report.intersections[0];
    assert_eq!(junction.participants, vec![ElementId(1), ElementId(3)]);
    assert_eq!(junction.topology, FittingTopology::Elbow);

    assert_eq!(report.fittings.len(), 1);
    let fitting = &report.fittings[0].selection;
    assert_eq!(fitting.match_kind, MatchKind::Exact);
    assert_eq!(fitting.resolved_key.as_deref(), Some("ELBOW-6"));
    assert_eq!(report.unresolved_fittings(), 0);

    // Both runs sit 5 below grade, deeper than the 4 required for water
    assert!(report.underground.depth.violations.is_empty());
    assert_relative_eq!(report.underground.depth.min_depth.unwrap(), 5.0, epsilon = 1e-6);
    assert_eq!(report.underground.corridors.len(), 1);

    assert_eq!(report.underground.clashes.len(), 1);
    let clash = &report.underground.clashes[0];
    assert_eq!((clash.a, clash.b), (ElementId(100), ElementId(1)));
    assert_relative_eq!(clash.actual_clearance, 1.5, epsilon = 1e-6);
    assert_eq!(clash.severity, Severity::Minor);
    assert!(clash.default_clearance_used);

    assert_eq!(report.network.created_elements.len(), 2);
    assert!(!report.network.has_errors());
    assert_eq!(report.network.network_count, 2);
    assert_eq!(sink.runs.len(), 2);

    assert!(report.has_issues());
}

#[test]
fn dedicated_pool_gives_identical_report() {
    let region = site();
    let existing = existing_electrical();
    let ground = FlatSurface::new(0.0);

    let global = Pipeline::heuristic(config()).unwrap();
    let pooled = Pipeline::heuristic(PipelineConfig {
        worker_threads: Some(2),
        ..config()
    })
    .unwrap();

    let a = global.run(&region, &ground, &existing, &mut RecordingSink::new()).unwrap();
    let b = pooled.run(&region, &ground, &existing, &mut RecordingSink::new()).unwrap();
    let c = global.run(&region, &ground, &existing, &mut RecordingSink::new()).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(a, c);
}

#[test]
fn empty_region_is_a_clean_report() {
    let pipeline = Pipeline::heuristic(PipelineConfig::default()).unwrap();
    let report = pipeline
        .run(
            &PointCloudRegion::new("empty", Vec::new()),
            &FlatSurface::new(0.0),
            &[],
            &mut RecordingSink::new(),
        )
        .unwrap();
    assert!(report.elements.is_empty());
    assert!(report.network.created_elements.is_empty());
    assert!(!report.has_issues());
}

struct Offline;

impl DetectionCapability for Offline {
    fn detect(&self, _points: &[Point3D]) -> Result<Vec<Candidate>, CapabilityError> {
        Err(CapabilityError::new("connection refused"))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

#[test]
fn capability_failure_aborts_the_run() {
    let pipeline = Pipeline::new(Offline, PipelineConfig::default()).unwrap();
    let err = pipeline
        .run(&site(), &FlatSurface::new(0.0), &[], &mut RecordingSink::new())
        .unwrap_err();
    assert!(matches!(err, Error::Detect(_)));
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn invalid_config_rejected_up_front() {
    let mut config = PipelineConfig::default();
    config.network.max_spacing = -1.0;
    assert!(matches!(
        Pipeline::heuristic(config),
        Err(Error::Network(_))
    ));
}
