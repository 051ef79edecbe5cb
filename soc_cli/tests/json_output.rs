use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Validate the JSONL shape for a replay run.
#[rstest]
fn replay_json_lines_schema() {
    let dir = tempdir().unwrap();
    let samples = dir.path().join("samples.csv");
    fs::write(
        &samples,
        "timestamp,soc,is_charging,ignition_on,charging_level,time_to_full_l2,time_to_full_l3\n\
         2024-05-01T18:00:00Z,80,false,false,,,\n\
         2024-05-01T22:00:00Z,,false,false,,,\n\
         2024-05-02T04:00:00Z,79.5,false,false,,,\n",
    )
    .unwrap();

    let out = Command::cargo_bin("socx")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("replay")
        .arg("--samples")
        .arg(&samples)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).expect("each line is JSON"))
        .collect();
    assert_eq!(lines.len(), 4);

    for l in &lines[..3] {
        assert!(l["timestamp"].is_string());
        assert!(l["result"]["outcome"].is_string());
        assert!(l["correction_factor"].is_number());
        assert!(l["idle_drain_rate"].is_number());
    }
    assert_eq!(lines[0]["result"]["outcome"], "accepted");
    assert_eq!(lines[1]["result"]["outcome"], "no_reading");
    assert_eq!(lines[2]["result"]["outcome"], "accepted");
    assert_eq!(lines[3]["summary"]["samples"], 3);
}

#[rstest]
fn errors_are_json_in_json_mode() {
    let dir = tempdir().unwrap();
    let out = Command::cargo_bin("socx")
        .unwrap()
        .arg("--json")
        .arg("inspect")
        .arg("--state")
        .arg(dir.path().join("missing.json"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(5));
    let v: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(v["reason"], "State");
    assert!(v["message"].as_str().unwrap().contains("does not exist"));
}

#[rstest]
fn simulate_json_reports_learning() {
    let out = Command::cargo_bin("socx")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("simulate")
        .arg("--hours")
        .arg("4")
        .arg("--ttf-bias")
        .arg("1.25")
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    let last: serde_json::Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert!(last["summary"]["correction_factor"].as_f64().unwrap() > 1.0);
}
