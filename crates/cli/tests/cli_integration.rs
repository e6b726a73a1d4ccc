//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `vigil` binary and verify exit codes,
//! stdout content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn vigil() -> Command {
    cargo_bin_cmd!("vigil")
}

/// Write the standard single-check fixture files into `dir`.
fn write_fixture(dir: &Path, results: &str) -> (String, String) {
    let checks = r#"[
        {
            "id": "check-1",
            "customer_id": "cust-1",
            "name": "api health",
            "min_failing_count": 1,
            "min_failing_time": 90
        }
    ]"#;
    let checks_path = dir.join("checks.json");
    let results_path = dir.join("results.json");
    fs::write(&checks_path, checks).unwrap();
    fs::write(&results_path, results).unwrap();
    (
        checks_path.to_string_lossy().into_owned(),
        results_path.to_string_lossy().into_owned(),
    )
}

fn result_json(bastion: &str, timestamp: &str, passing: bool) -> String {
    format!(
        r#"{{
            "customer_id": "cust-1",
            "check_id": "check-1",
            "bastion_id": "{bastion}",
            "timestamp": "{timestamp}",
            "passing": {passing},
            "responses": [{{ "passing": {passing}, "error": null }}]
        }}"#
    )
}

// ──────────────────────────────────────────────
// Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    vigil()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Vigil check-state engine"));
}

#[test]
fn version_exits_0() {
    vigil()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vigil"));
}

// ──────────────────────────────────────────────
// Replay
// ──────────────────────────────────────────────

#[test]
fn replay_reports_a_confirmed_failure() {
    let dir = TempDir::new().unwrap();
    let results = format!(
        "[{},{}]",
        result_json("bastion-a", "2025-01-01T00:00:00Z", false),
        result_json("bastion-a", "2025-01-01T00:01:30Z", false)
    );
    let (checks, results) = write_fixture(dir.path(), &results);

    vigil()
        .args(["replay", "--checks", &checks, &results])
        .assert()
        .success()
        .stdout(predicate::str::contains("transition: check-1 OK -> FAIL_WAIT"))
        .stdout(predicate::str::contains("transition: check-1 FAIL_WAIT -> FAIL"))
        .stdout(predicate::str::contains("alert: check-1 FAIL (bastion bastion-a)"))
        .stdout(predicate::str::contains("check-1 FAIL failing 1/1"));
}

#[test]
fn replay_json_output_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let results = format!(
        "[{},{}]",
        result_json("bastion-a", "2025-01-01T00:00:00Z", false),
        result_json("bastion-a", "2025-01-01T00:01:30Z", false)
    );
    let (checks, results) = write_fixture(dir.path(), &results);

    let output = vigil()
        .args(["replay", "--output", "json", "--checks", &checks, &results])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["results_replayed"], 2);
    assert_eq!(report["stale"], 0);
    assert_eq!(report["final_states"][0]["state"], "FAIL");
    assert_eq!(report["alerts"][0]["state"], "FAIL");
    assert_eq!(report["transitions"].as_array().unwrap().len(), 2);
}

#[test]
fn replay_counts_stale_and_discarded_results() {
    let dir = TempDir::new().unwrap();
    // Second entry redelivers the first; third is missing its check id.
    let results = format!(
        "[{},{},{}]",
        result_json("bastion-a", "2025-01-01T00:00:00Z", true),
        result_json("bastion-a", "2025-01-01T00:00:00Z", true),
        result_json("bastion-a", "2025-01-01T00:00:30Z", true).replace("check-1", "")
    );
    let (checks, results) = write_fixture(dir.path(), &results);

    let output = vigil()
        .args(["replay", "--output", "json", "--checks", &checks, &results])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["stale"], 1);
    assert_eq!(report["discarded"], 1);
    assert_eq!(report["final_states"][0]["state"], "OK");
}

#[test]
fn replay_missing_file_exits_1() {
    let dir = TempDir::new().unwrap();
    let (checks, _) = write_fixture(dir.path(), "[]");

    vigil()
        .args(["replay", "--checks", &checks, "/nonexistent/results.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn replay_malformed_results_exits_1() {
    let dir = TempDir::new().unwrap();
    let (checks, results) = write_fixture(dir.path(), "{ not an array");

    vigil()
        .args(["replay", "--checks", &checks, &results])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

// ──────────────────────────────────────────────
// Conformance
// ──────────────────────────────────────────────

#[test]
fn conformance_suite_passes_on_the_memory_backend() {
    vigil()
        .arg("conformance")
        .assert()
        .success()
        .stdout(predicate::str::contains("(0 failed)"));
}

#[test]
fn conformance_json_output() {
    let output = vigil()
        .args(["conformance", "--output", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["failed"], 0);
    assert!(report["total"].as_u64().unwrap() > 0);
}
