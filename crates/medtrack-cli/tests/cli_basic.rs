//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against the dev data directory
//! and verify outputs.

use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(args: &[&str]) -> (i32, String, String) {
    let output = Command::new("cargo")
        .args(["run", "-p", "medtrack-cli", "--"])
        .args(args)
        .env("MEDTRACK_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

/// Pull the id out of lines like "Patient 3 added: ..." / "Treatment 2 created ...".
fn second_token(line: &str) -> &str {
    line.split_whitespace().nth(1).expect("no id in output")
}

#[test]
fn test_help() {
    let (code, stdout, _) = run_cli(&["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Medtrack CLI"));
}

#[test]
fn test_notify_dry_run() {
    let (code, stdout, _) = run_cli(&["notify", "run", "--dry-run"]);
    assert_eq!(code, 0, "notify run --dry-run failed");
    assert!(stdout.contains("active treatment steps"));
    assert!(stdout.contains("[DRY RUN]"));
}

#[test]
fn test_patient_treatment_step_flow() {
    let (code, stdout, _) = run_cli(&["patient", "add", "--name", "Flow Test", "--email", "flow@example.com"]);
    assert_eq!(code, 0, "patient add failed");
    let patient_id = second_token(stdout.lines().next().unwrap()).to_string();

    let (code, stdout, _) = run_cli(&["treatment", "create", "--patient", &patient_id]);
    assert_eq!(code, 0, "treatment create failed");
    let treatment_id = second_token(stdout.lines().next().unwrap()).to_string();

    let (code, stdout, _) = run_cli(&[
        "treatment",
        "add-step",
        &treatment_id,
        "--name",
        "Aligner 1",
        "--duration-days",
        "7",
    ]);
    assert_eq!(code, 0, "add-step failed");
    assert!(stdout.contains("(active)"), "first step should be active");

    let (code, stdout, _) = run_cli(&[
        "treatment",
        "add-step",
        &treatment_id,
        "--name",
        "Aligner 2",
        "--duration-days",
        "10",
    ]);
    assert_eq!(code, 0);
    assert!(stdout.contains("(pending)"), "second step should be pending");

    let (code, stdout, _) = run_cli(&["step", "list", &treatment_id]);
    assert_eq!(code, 0, "step list failed");
    assert!(stdout.contains("Aligner 1"));
    assert!(stdout.contains("Aligner 2"));

    let (code, stdout, _) = run_cli(&["step", "list", &treatment_id, "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("invalid JSON");
    assert_eq!(parsed.as_array().map(|steps| steps.len()), Some(2));
}

#[test]
fn test_step_status_runs() {
    let (code, stdout, _) = run_cli(&["step", "status"]);
    assert_eq!(code, 0, "step status failed");
    assert!(stdout.contains("active steps"));
}

#[test]
fn test_config_show() {
    let (code, stdout, _) = run_cli(&["config", "show"]);
    assert_eq!(code, 0, "config show failed");
    assert!(stdout.contains("[notifications]"));
}
