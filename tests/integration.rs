use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;

fn harmap() -> Command {
    cargo_bin_cmd!()
}

#[test]
fn test_help() {
    harmap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reverse-engineer undocumented web workflows"));
}

#[test]
fn test_version() {
    harmap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("harmap"));
}

#[test]
fn test_candidates_filters_static_assets_and_tracking_keywords() {
    harmap()
        .args(["candidates", "--har", "tests/fixtures/sample.har"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app.bundle.js"))
        .stdout(predicate::str::contains("/session"))
        .stdout(predicate::str::contains("/do"))
        .stdout(predicate::str::contains("3 candidate URLs"))
        .stdout(predicate::str::contains("google-analytics").not());
}

#[test]
fn test_candidates_missing_file_is_an_error() {
    harmap()
        .args(["candidates", "--har", "tests/fixtures/does-not-exist.har"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_candidates_rejects_malformed_har() {
    harmap()
        .args(["candidates", "--har", "tests/fixtures/malformed.har"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid HAR file"));
}

#[test]
fn test_config_prints_resolved_defaults() {
    harmap()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("network_requests.har"))
        .stdout(predicate::str::contains("max_steps = 15"));
}

#[test]
fn test_discover_rejects_empty_action_description() {
    harmap()
        .args(["discover", "  ", "--har", "tests/fixtures/sample.har"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("action description must not be empty"));
}

#[test]
fn test_discover_input_flag_requires_key_value_form() {
    harmap()
        .args([
            "discover",
            "perform the action",
            "--har",
            "tests/fixtures/sample.har",
            "--input",
            "not-key-value",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}
