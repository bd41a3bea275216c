use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use action_locator::DefaultElementResolver;
use async_trait::async_trait;
use cdp_adapter::{FakeElement, FakePage, InMemorySite, LaunchOptions};
use plan_advisor::{AdvisorError, MockRepair, RepairAdapter, RepairRequest};
use plan_schema::{TestPlan, TestStep};
use pretty_assertions::assert_eq;
use run_orchestrator::{RunOptions, RunOrchestrator, RunSettings, RunStore};
use serde_json::{json, Value};
use site_profile::InMemorySiteProfileStore;
use testair::RepairLoop;

fn login_site() -> InMemorySite {
    InMemorySite::new().with_page(
        "https://app.test/login",
        FakePage::new("Login")
            .with(FakeElement::input("Email"))
            .with(FakeElement::button("Submit")),
    )
}

fn orchestrator(site: &InMemorySite, root: &Path) -> RunOrchestrator {
    RunOrchestrator::new(
        Arc::new(site.clone()),
        Arc::new(InMemorySiteProfileStore::new()),
        RunStore::new(root),
    )
    .with_resolver(Arc::new(
        DefaultElementResolver::new().with_probe_cap(Duration::from_millis(20)),
    ))
    .with_settings(RunSettings {
        step_timeout: Duration::from_millis(300),
        launch: LaunchOptions::default(),
    })
}

fn plan(steps: Value) -> TestPlan {
    TestPlan::from_value(json!({ "version": "1", "name": "login", "steps": steps })).unwrap()
}

fn run_dirs(root: &Path) -> Vec<std::path::PathBuf> {
    let mut dirs: Vec<_> = std::fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

#[tokio::test]
async fn failed_click_is_repaired_and_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let site = login_site();
    let repair = RepairLoop::new(
        orchestrator(&site, dir.path()),
        Arc::new(MockRepair),
        2,
        Duration::from_secs(5),
    );
    let original = plan(json!([
        { "type": "goto", "url": "https://app.test/login" },
        { "type": "click", "target": "Sign in" }
    ]));

    let outcome = repair.run(&original, RunOptions::default()).await.unwrap();

    assert!(outcome.result.passed());
    assert_eq!(outcome.attempts, 1);
    match &outcome.plan.steps[1] {
        TestStep::Click(click) => assert_eq!(click.target, "Submit"),
        other => panic!("unexpected step {other:?}"),
    }
    assert_eq!(site.launches(), 2);
    assert_eq!(site.open_sessions(), 0);

    let dirs = run_dirs(dir.path());
    assert_eq!(dirs.len(), 2);
    let snapshots: Vec<_> = dirs
        .iter()
        .filter(|dir| dir.join("plan.repaired.1.json").exists())
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert_ne!(
        snapshots[0].file_name().unwrap().to_str().unwrap(),
        outcome.result.run_id
    );

    let snapshot: TestPlan = serde_json::from_str(
        &std::fs::read_to_string(snapshots[0].join("plan.repaired.1.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot, outcome.plan);
}

#[tokio::test]
async fn empty_patch_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let site = login_site();
    let repair = RepairLoop::new(
        orchestrator(&site, dir.path()),
        Arc::new(MockRepair),
        3,
        Duration::from_secs(5),
    );
    let original = plan(json!([
        { "type": "goto", "url": "https://app.test/login" },
        { "type": "fill", "field": "Password", "value": "hunter2" }
    ]));

    let outcome = repair.run(&original, RunOptions::default()).await.unwrap();

    assert!(!outcome.result.passed());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.plan, original);
    assert_eq!(site.launches(), 1);
    assert_eq!(run_dirs(dir.path()).len(), 1);
}

struct UnreachableAdapter;

#[async_trait]
impl RepairAdapter for UnreachableAdapter {
    async fn repair(&self, _request: &RepairRequest) -> Result<Value, AdvisorError> {
        Err(AdvisorError::Request("connection refused".to_string()))
    }
}

#[tokio::test]
async fn adapter_errors_consume_attempts_and_keep_the_plan() {
    let dir = tempfile::tempdir().unwrap();
    let site = login_site();
    let repair = RepairLoop::new(
        orchestrator(&site, dir.path()),
        Arc::new(UnreachableAdapter),
        2,
        Duration::from_secs(5),
    );
    let original = plan(json!([
        { "type": "goto", "url": "https://app.test/login" },
        { "type": "click", "target": "Sign in" }
    ]));

    let outcome = repair.run(&original, RunOptions::default()).await.unwrap();

    assert!(!outcome.result.passed());
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.plan, original);
    assert_eq!(site.launches(), 1);
}

struct OutOfRangeAdapter;

#[async_trait]
impl RepairAdapter for OutOfRangeAdapter {
    async fn repair(&self, _request: &RepairRequest) -> Result<Value, AdvisorError> {
        Ok(json!({
            "reason": "guess",
            "operations": [{ "op": "replace", "path": "/steps/9/target", "value": "Submit" }]
        }))
    }
}

#[tokio::test]
async fn rejected_patches_are_not_applied() {
    let dir = tempfile::tempdir().unwrap();
    let site = login_site();
    let repair = RepairLoop::new(
        orchestrator(&site, dir.path()),
        Arc::new(OutOfRangeAdapter),
        1,
        Duration::from_secs(5),
    );
    let original = plan(json!([
        { "type": "goto", "url": "https://app.test/login" },
        { "type": "click", "target": "Sign in" }
    ]));

    let outcome = repair.run(&original, RunOptions::default()).await.unwrap();

    assert!(!outcome.result.passed());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.plan, original);
    let dirs = run_dirs(dir.path());
    assert_eq!(dirs.len(), 1);
    assert!(!dirs[0].join("plan.repaired.1.json").exists());
}

struct SlowAdapter;

#[async_trait]
impl RepairAdapter for SlowAdapter {
    async fn repair(&self, _request: &RepairRequest) -> Result<Value, AdvisorError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!({ "reason": "late", "operations": [] }))
    }
}

#[tokio::test]
async fn slow_adapter_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let site = login_site();
    let repair = RepairLoop::new(
        orchestrator(&site, dir.path()),
        Arc::new(SlowAdapter),
        1,
        Duration::from_millis(50),
    );
    let original = plan(json!([
        { "type": "goto", "url": "https://app.test/login" },
        { "type": "click", "target": "Sign in" }
    ]));

    let outcome = repair.run(&original, RunOptions::default()).await.unwrap();

    assert!(!outcome.result.passed());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(site.launches(), 1);
}

#[tokio::test]
async fn dry_runs_are_never_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let site = login_site();
    let repair = RepairLoop::new(
        orchestrator(&site, dir.path()),
        Arc::new(MockRepair),
        2,
        Duration::from_secs(5),
    );
    let original = plan(json!([
        { "type": "goto", "url": "https://app.test/login" },
        { "type": "click", "target": "Sign in" }
    ]));

    let outcome = repair.run(&original, RunOptions::dry_run()).await.unwrap();

    assert!(outcome.result.passed());
    assert_eq!(outcome.attempts, 0);
    assert_eq!(site.launches(), 0);
}
