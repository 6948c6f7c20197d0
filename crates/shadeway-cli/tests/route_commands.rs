//! Integration tests for the `route` subcommand.

mod common;

use common::{enclosure, midpoint_block, point_arg, TestEnv};
use predicates::prelude::*;
use serde_json::Value;

fn route_args(time: &str) -> Vec<String> {
    vec![
        "route".to_string(),
        "--from".to_string(),
        point_arg(0.0, 0.0),
        "--to".to_string(),
        point_arg(0.004, 0.0),
        "--time".to_string(),
        time.to_string(),
    ]
}

fn json_stdout(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn text_route_lists_points_and_summary() {
    let env = TestEnv::new(vec![midpoint_block()]);
    env.command()
        .args(route_args("10:00"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Shade-aware route (walk)"))
        .stdout(predicate::str::contains("Total distance:"))
        .stdout(predicate::str::contains("Average shade:"));
}

#[test]
fn json_route_serializes_the_plan() {
    let env = TestEnv::new(vec![midpoint_block()]);
    let output = env
        .command()
        .args(["--format", "json"])
        .args(route_args("10:00"))
        .args(["--mode", "run"])
        .output()
        .expect("run cli");
    assert!(output.status.success());

    let plan = json_stdout(&output);
    assert_eq!(plan["strategy"], "shade_aware");
    assert_eq!(plan["transport_mode"], "run");
    let points = plan["route_points"].as_array().expect("points");
    assert!(points.len() > 2 && points.len() <= 20);
    assert!(plan["grid_width"].as_u64().unwrap() > 0);
}

#[test]
fn direct_route_interpolates_twenty_points() {
    let env = TestEnv::new(vec![midpoint_block()]);
    let output = env
        .command()
        .args(["--format", "json"])
        .args(route_args("10:00"))
        .arg("--direct")
        .output()
        .expect("run cli");
    assert!(output.status.success());

    let plan = json_stdout(&output);
    assert_eq!(plan["strategy"], "direct");
    assert_eq!(plan["route_points"].as_array().unwrap().len(), 20);
    assert_eq!(plan["grid_width"], 0);
}

#[test]
fn compare_reports_both_plans() {
    let env = TestEnv::new(vec![midpoint_block()]);
    let output = env
        .command()
        .args(["--format", "json"])
        .args(route_args("10:00"))
        .arg("--compare")
        .output()
        .expect("run cli");
    assert!(output.status.success());

    let comparison = json_stdout(&output);
    assert_eq!(comparison["shade_aware"]["strategy"], "shade_aware");
    assert_eq!(comparison["direct"]["strategy"], "direct");
    assert!(comparison["distance_improvement_m"].as_f64().unwrap() < 0.0);

    env.command()
        .args(route_args("10:00"))
        .arg("--compare")
        .assert()
        .success()
        .stdout(predicate::str::contains("Comparison"))
        .stdout(predicate::str::contains("Extra distance: +"));
}

#[test]
fn enclosed_destination_fails_and_suggests_direct() {
    let env = TestEnv::new(enclosure());
    env.command()
        .args(route_args("10:00"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--direct"));
}

#[test]
fn endpoint_inside_building_fails() {
    let env = TestEnv::new(vec![midpoint_block()]);
    env.command()
        .args([
            "route",
            "--from",
            &point_arg(0.002, 0.0),
            "--to",
            &point_arg(0.004, 0.0),
            "--time",
            "10:00",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("inside a building"));
}

#[test]
fn invalid_time_is_rejected() {
    let env = TestEnv::new(Vec::new());
    env.command()
        .args(route_args("25:00"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid route request"));
}

#[test]
fn malformed_coordinates_are_usage_errors() {
    let env = TestEnv::new(Vec::new());
    env.command()
        .args(["route", "--from", "139.7", "--to", "139.7,35.69", "--time", "10:00"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("comma-separated"));
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let env = TestEnv::new(Vec::new());
    env.command()
        .args(route_args("10:00"))
        .args(["--mode", "hover"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown transport mode"));
}

#[test]
fn missing_building_file_is_reported() {
    let env = TestEnv::new(Vec::new());
    let missing = env.dir.join("missing.geojson");
    env.bare_command()
        .arg("--buildings")
        .arg(&missing)
        .args(route_args("10:00"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.geojson"));
}
