//! Integration tests that execute the real CLI binary.
//!
//! Each test runs `coherence-cli` via `std::process::Command` and checks the
//! exit code and stdout.

use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_coherence-cli"))
        .args(args)
        .env_remove("COHERENCE_CONFIG")
        .env_remove("COHERENCE_IDENTITY_DIR")
        .output()
        .expect("failed to run coherence-cli")
}

fn json_stdout(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().last().expect("no stdout");
    serde_json::from_str(line).expect("stdout is not JSON")
}

#[test]
fn test_label_boundaries() {
    let output = run(&["label", "70", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json_stdout(&output)["state"], "RECOVERING");

    let output = run(&["label", "69.99"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("FRAYING"));
}

#[test]
fn test_decay_anchored_rate() {
    let output = run(&[
        "decay",
        "--score",
        "90",
        "--last-seen",
        "2026-03-10T00:00:00Z",
        "--now",
        "2026-03-11T00:00:00Z",
        "--anchored",
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let body = json_stdout(&output);
    assert_eq!(body["decay_units"], 4);
    assert_eq!(body["score"], 78.0);
}

#[test]
fn test_day_is_capped_for_unanchored() {
    let output = run(&[
        "day",
        "--start",
        "2026-01-01T00:00:00Z",
        "--now",
        "2026-03-10T12:00:00Z",
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(0));
    let body = json_stdout(&output);
    assert_eq!(body["day"], 30);
    assert_eq!(body["day_capped"], true);
    assert_eq!(body["next_rollover"], "2026-03-11T00:00:00Z");
}

#[test]
fn test_identity_show_create_and_corrupt() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().to_str().expect("utf-8 path");

    let output = run(&["identity", "show", "--dir", path, "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json_stdout(&output)["found"], false);

    let output = run(&["identity", "show", "--dir", path, "--create", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));
    let created = json_stdout(&output);
    assert_eq!(created["created"], true);

    let output = run(&["identity", "show", "--dir", path, "--format", "json"]);
    assert_eq!(json_stdout(&output)["visitor_id"], created["visitor_id"]);

    std::fs::write(dir.path().join("coherence.visitor_identity.json"), "{broken")
        .expect("write corrupt blob");
    let output = run(&["identity", "show", "--dir", path]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_bad_config_file_is_warning() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[engine]\nanchored_decay_rate = 9.0\n").expect("write config");

    let output = run(&["--config", config.to_str().expect("utf-8 path"), "label", "50"]);
    assert_eq!(output.status.code(), Some(1));
}
