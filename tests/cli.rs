use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

const LOGIN_PLAN: &str = r#"{
  "version": "1",
  "name": "login smoke",
  "steps": [
    { "type": "goto", "url": "https://app.test/login" },
    { "type": "login", "username": "${SECRET:USERNAME}", "password": "${SECRET:PASSWORD}" },
    { "type": "expect", "urlIncludes": "dashboard" }
  ]
}"#;

fn testair(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("testair").expect("binary built");
    cmd.current_dir(workdir)
        .env("XDG_CONFIG_HOME", workdir)
        .env_remove("RUST_LOG")
        .env_remove("TESTAIR_ARTIFACTS_ROOT");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8 output")
}

#[test]
fn compile_prints_one_line_per_compiled_step() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("plan.json"), LOGIN_PLAN).unwrap();

    let assert = testair(dir.path())
        .args(["compile", "plan.json"])
        .assert()
        .success();
    let stdout = stdout_of(assert.get_output());
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("1. goto("));
    assert!(lines[1].starts_with("2. fill("));
    assert!(lines[5].starts_with("6. expect("));
}

#[test]
fn dry_run_records_a_run_that_replay_can_read() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("plan.json"), LOGIN_PLAN).unwrap();

    let assert = testair(dir.path())
        .args(["run", "plan.json", "--dry-run", "--artifacts-root", "out"])
        .assert()
        .success();
    let stdout = stdout_of(assert.get_output());
    let summary = stdout
        .lines()
        .find(|line| line.starts_with("runId="))
        .expect("summary line");
    assert!(summary.contains("status=passed"));
    assert!(summary.ends_with("durationMs=0"));
    assert!(stdout.contains("PASSED step=1 DRY RUN: "));
    assert!(stdout.lines().any(|line| line.starts_with("1. goto(")));

    let run_id = summary
        .split_whitespace()
        .next()
        .and_then(|field| field.strip_prefix("runId="))
        .unwrap()
        .to_string();
    let stored = std::fs::read_to_string(dir.path().join("out").join(&run_id).join("RunResult.json"))
        .unwrap();
    assert!(stored.contains("${SECRET:USERNAME}"));

    let assert = testair(dir.path())
        .args(["replay", &run_id, "--artifacts-root", "out"])
        .assert()
        .success();
    let replay = stdout_of(assert.get_output());
    assert!(replay.starts_with(&format!("runId={run_id} status=passed")));
    assert!(replay.lines().any(|line| line.starts_with("trace=")));
    assert!(!replay.contains("failureScreenshot="));
}

#[test]
fn invalid_plan_fails_without_a_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("plan.json"),
        r#"{ "version": "1", "steps": [] }"#,
    )
    .unwrap();

    testair(dir.path())
        .args(["run", "plan.json", "--dry-run", "--artifacts-root", "out"])
        .assert()
        .failure();
    assert!(!dir.path().join("out").exists());
}

#[test]
fn replay_of_unknown_run_fails() {
    let dir = tempfile::tempdir().unwrap();
    testair(dir.path())
        .args(["replay", "run_missing", "--artifacts-root", "out"])
        .assert()
        .failure();
}

#[test]
fn mock_planner_prints_a_redacted_plan() {
    let dir = tempfile::tempdir().unwrap();
    let assert = testair(dir.path())
        .args(["plan", "login to the admin area", "--url", "https://app.test/login", "--provider", "mock"])
        .assert()
        .success();
    let plan: Value = serde_json::from_str(&stdout_of(assert.get_output())).expect("plan json");

    let steps = plan["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0]["url"], "https://app.test/login");
    assert_eq!(steps[1]["type"], "login");
    assert_eq!(steps[1]["username"], "${SECRET:***}");
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    testair(dir.path())
        .args(["--config", "nope.yaml", "compile", "plan.json"])
        .assert()
        .failure();
}
