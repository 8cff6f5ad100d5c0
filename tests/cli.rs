//! Runs the `synapse-home` binary end to end.

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;

const START: &str = "2025-06-01T00:00";

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_synapse-home"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("synapse-home should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("synapse-home-cli-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

#[test]
fn default_run_prints_hours_summary_and_kpis() {
    let output = run(&["--start", START]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert_eq!(text.lines().filter(|l| l.starts_with("h=")).count(), 24);
    assert!(text.contains("--- Simulation Summary ---"));
    assert!(text.contains("--- KPI Report ---"));
}

#[test]
fn json_output_is_a_full_trace() {
    let output = run(&["--start", START, "--json", "--mode", "cost-optimization"]);
    assert!(output.status.success());

    let trace: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let hours = trace["hourly_results"].as_array().expect("hourly_results array");
    assert_eq!(hours.len(), 24);
    assert_eq!(
        hours[0]["decision"]["current_operating_mode"].as_str(),
        Some("Cost Optimization")
    );
    assert!(trace["summary"]["final_battery_charge_kwh"].is_number());
}

#[test]
fn same_seed_gives_identical_output() {
    let a = run(&["--start", START, "--json", "--seed", "9"]);
    let b = run(&["--start", START, "--json", "--seed", "9"]);
    assert!(a.status.success() && b.status.success());
    assert_eq!(a.stdout, b.stdout);
}

#[test]
fn status_prints_snapshot() {
    let output = run(&["--start", "2025-06-01T13:00", "--status"]);
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert!(report.get("kpi").is_some());
    assert!(report.get("live_data").is_some());
    assert_eq!(report["tou_prices"]["buying_price_per_kwh"].as_f64(), Some(0.22));
}

#[test]
fn unknown_mode_is_rejected() {
    let output = run(&["--start", START, "--mode", "turbo"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--mode"));
}

#[test]
fn unknown_argument_is_rejected() {
    let output = run(&["--frobnicate"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn telemetry_out_writes_csv() {
    let dir = scratch_dir("telemetry");
    let path = dir.join("trace.csv");
    let output = run(&["--start", START, "--telemetry-out", path.to_str().unwrap_or_default()]);
    assert!(output.status.success());

    let csv = std::fs::read_to_string(&path).expect("CSV should be written");
    assert_eq!(csv.lines().count(), 25);
    assert!(csv.starts_with("hour_index,"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_settings_file_exits_with_errors() {
    let dir = scratch_dir("bad_settings");
    let path = dir.join("settings.toml");
    std::fs::write(&path, "battery_capacity_kwh = -4.0\nmin_battery_reserve_user_percent = 300\n")
        .expect("settings should be writable");

    let output = run(&["--start", START, "--settings", path.to_str().unwrap_or_default()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("battery_capacity_kwh"));
    assert!(stderr.contains("min_battery_reserve_user_percent"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn bundled_settings_and_profile_run() {
    let output = run(&[
        "--start",
        START,
        "--settings",
        "data/settings.toml",
        "--profile",
        "data/household_profile.csv",
        "--json",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let trace: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let hours = trace["hourly_results"].as_array().expect("hourly_results array");
    assert_eq!(hours[0]["predicted_solar_kwh"].as_f64(), Some(0.0));
    assert_eq!(hours[0]["predicted_demand_kwh"].as_f64(), Some(0.6));
}
