// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: infer a buried utility network from a point cloud region
//!
//! Reads a JSON `PointCloudRegion`, runs the full pipeline against an
//! in-memory authoring sink and writes the JSON report.
//!
//! Usage:
//!   pipescan <region.json> [options]

use pipescan_core::{PointCloudRegion, UtilityElement};
use pipescan_geometry::{FlatSurface, GridSurface, GroundSurface};
use pipescan_network::RecordingSink;
use pipescan_processing::{Pipeline, PipelineConfig};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "info,pipescan_processing=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let region_path = &args[1];

    // Parse options
    let mut ground_elevation: Option<f64> = None;
    let mut ground_grid: Option<String> = None;
    let mut config_path: Option<String> = None;
    let mut existing_path: Option<String> = None;
    let mut threshold: Option<f64> = None;
    let mut output_path: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--ground-elevation" => {
                ground_elevation = Some(parse_number(value_of(&args, &mut i), "ground elevation"));
            }
            "--ground-grid" => {
                ground_grid = Some(value_of(&args, &mut i).to_string());
            }
            "--config" => {
                config_path = Some(value_of(&args, &mut i).to_string());
            }
            "--existing" => {
                existing_path = Some(value_of(&args, &mut i).to_string());
            }
            "--threshold" => {
                threshold = Some(parse_number(value_of(&args, &mut i), "threshold"));
            }
            "--output" => {
                output_path = Some(value_of(&args, &mut i).to_string());
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => PipelineConfig::from_json_file(path).unwrap_or_else(|e| fail(e)),
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    if let Some(t) = threshold {
        config.detection.confidence_threshold = t;
    }

    let region: PointCloudRegion = read_json(region_path);
    let existing: Vec<UtilityElement> = existing_path
        .as_deref()
        .map(read_json)
        .unwrap_or_default();
    let ground: Box<dyn GroundSurface> = match (&ground_grid, ground_elevation) {
        (Some(path), _) => {
            let grid: GridSurface = read_json(path);
            Box::new(grid)
        }
        (None, z) => Box::new(FlatSurface::new(z.unwrap_or(0.0))),
    };

    let pipeline = Pipeline::heuristic(config).unwrap_or_else(|e| fail(e));
    let mut sink = RecordingSink::new();
    let report = pipeline
        .run(&region, ground.as_ref(), &existing, &mut sink)
        .unwrap_or_else(|e| fail(e));

    let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| fail(e));
    match &output_path {
        Some(path) => {
            fs::write(path, json)
                .unwrap_or_else(|e| fail(format!("cannot write '{}': {}", path, e)));
            eprintln!("Report written to {}", path);
        }
        None => println!("{}", json),
    }

    eprintln!(
        "{} runs, {} junctions ({} unresolved), {} clashes, {} depth violations, {} item errors",
        report.elements.len(),
        report.intersections.len(),
        report.unresolved_fittings(),
        report.underground.clashes.len(),
        report.underground.depth.violations.len(),
        report.network.errors.len(),
    );
    if report.has_issues() {
        process::exit(2);
    }
}

fn value_of<'a>(args: &'a [String], i: &mut usize) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            eprintln!("Missing value for {}", args[*i - 1]);
            print_usage();
            process::exit(1);
        }
    }
}

fn parse_number(value: &str, what: &str) -> f64 {
    value
        .parse()
        .unwrap_or_else(|_| fail(format!("invalid {} value '{}'", what, value)))
}

fn read_json<T: DeserializeOwned>(path: &str) -> T {
    let text = fs::read_to_string(Path::new(path))
        .unwrap_or_else(|e| fail(format!("cannot read '{}': {}", path, e)));
    serde_json::from_str(&text).unwrap_or_else(|e| fail(format!("cannot parse '{}': {}", path, e)))
}

fn fail(error: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", error);
    process::exit(1);
}

fn print_usage() {
    eprintln!("pipescan - infer buried utility networks from point clouds");
    eprintln!();
    eprintln!("Usage: pipescan <region.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --ground-elevation <Z>  Flat ground surface elevation (default: 0)");
    eprintln!("  --ground-grid <FILE>    Elevation grid JSON, overrides --ground-elevation");
    eprintln!("  --config <FILE>         Pipeline configuration JSON");
    eprintln!("  --existing <FILE>       Existing utility elements JSON for clash checks");
    eprintln!("  --threshold <T>         Detection confidence threshold (0-1)");
    eprintln!("  --output <FILE>         Write the report here instead of stdout");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PIPESCAN_CONFIDENCE_THRESHOLD, PIPESCAN_CLUSTER_RADIUS,");
    eprintln!("  PIPESCAN_DEPTH_SAMPLES, PIPESCAN_WORKER_THREADS, RUST_LOG");
    eprintln!();
    eprintln!("Exit status: 0 clean, 1 failure, 2 report has issues");
}
