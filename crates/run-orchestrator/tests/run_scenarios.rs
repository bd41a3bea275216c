use std::sync::Arc;
use std::time::Duration;

use action_locator::DefaultElementResolver;
use async_trait::async_trait;
use cdp_adapter::{
    AdapterError, AdapterErrorKind, BrowserLauncher, BrowserSession, FakeAction, FakeElement,
    FakePage, InMemorySite, LaunchOptions,
};
use plan_schema::TestPlan;
use pretty_assertions::assert_eq;
use run_orchestrator::{
    RunError, RunOptions, RunOrchestrator, RunSettings, RunStatus, RunStore, StepStatus,
};
use secret_resolver::StaticSecrets;
use site_profile::InMemorySiteProfileStore;

const EXAMPLE_PLAN: &str = r#"{
  "version": "1",
  "name": "example smoke",
  "steps": [
    { "type": "goto", "url": "https://example.com" },
    { "type": "expect", "textVisible": "Example Domain" },
    { "type": "click", "target": "More information..." },
    { "type": "extractTextList", "selector": "p", "outputKey": "paragraphs" }
  ]
}"#;

fn example_site() -> InMemorySite {
    InMemorySite::new().with_page(
        "https://example.com",
        FakePage::new("Example Domain")
            .with(FakeElement::new("h1").with_text("Example Domain"))
            .with(FakeElement::new("p").with_selector("p").with_text("This domain is for use in examples.")),
    )
}

fn orchestrator(
    site: &InMemorySite,
    profiles: Arc<InMemorySiteProfileStore>,
    root: &std::path::Path,
) -> RunOrchestrator {
    RunOrchestrator::new(Arc::new(site.clone()), profiles, RunStore::new(root))
        .with_resolver(Arc::new(
            DefaultElementResolver::new().with_probe_cap(Duration::from_millis(20)),
        ))
        .with_settings(RunSettings {
            step_timeout: Duration::from_millis(1_000),
            launch: LaunchOptions::default(),
        })
}

#[tokio::test]
async fn dry_run_passes_every_step_without_a_browser() {
    let dir = tempfile::tempdir().unwrap();
    let site = example_site();
    let runner = orchestrator(&site, Arc::new(InMemorySiteProfileStore::new()), dir.path());
    let plan = TestPlan::from_json_str(EXAMPLE_PLAN).unwrap();

    let result = runner.run(&plan, RunOptions::dry_run()).await.unwrap();

    assert_eq!(result.status, RunStatus::Passed);
    assert_eq!(result.steps.len(), 4);
    for step in &result.steps {
        assert_eq!(step.status, StepStatus::Passed);
        assert_eq!(step.duration_ms, 0);
        assert!(step.description.starts_with("DRY RUN: "));
    }
    assert_eq!(site.launches(), 0);
    assert!(result.artifacts.result_path.exists());
    assert!(!result.artifacts.trace_path.exists());

    let stored = runner.store().load_result(&result.run_id).await.unwrap();
    assert_eq!(stored, result);
}

#[tokio::test]
async fn missing_target_fails_the_run_and_captures_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let site = example_site();
    let runner = orchestrator(&site, Arc::new(InMemorySiteProfileStore::new()), dir.path());
    let plan = TestPlan::from_json_str(EXAMPLE_PLAN).unwrap();

    let result = runner.run(&plan, RunOptions::default()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.steps[0].status, StepStatus::Passed);
    assert_eq!(result.steps[1].status, StepStatus::Passed);

    let failed = result.failed_step().unwrap();
    assert_eq!(failed.index, 2);
    assert_eq!(failed.kind, "click");
    assert!(failed.error.as_deref().unwrap().contains("More information..."));
    assert_eq!(failed.artifact_paths.len(), 2);

    let screenshot = result.artifacts.failure_screenshot_path.clone().unwrap();
    let dom = result.artifacts.failure_dom_path.clone().unwrap();
    assert!(screenshot.ends_with("failure-step-3.png"));
    assert!(dom.ends_with("failure-step-3.dom.html"));
    assert!(screenshot.exists());
    assert!(std::fs::read_to_string(&dom).unwrap().contains("Example Domain"));
    assert!(result.artifacts.trace_path.exists());
    assert!(result.artifacts.result_path.exists());
    assert!(result.outputs.is_empty());
    assert_eq!(site.open_sessions(), 0);
}

#[tokio::test]
async fn extracted_text_lands_in_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let site = InMemorySite::new().with_page(
        "https://news.test",
        FakePage::new("News")
            .with(FakeElement::new("li").with_selector(".headline").with_text("  Rust 2024 \n released "))
            .with(FakeElement::new("li").with_selector(".headline").with_text("   "))
            .with(FakeElement::new("li").with_selector(".headline").with_text("Tokio 2.0")),
    );
    let runner = orchestrator(&site, Arc::new(InMemorySiteProfileStore::new()), dir.path());
    let plan = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://news.test" },
            { "type": "extractTextList", "selector": ".headline", "outputKey": "headlines", "limit": 3 }
        ]
    }))
    .unwrap();

    let result = runner.run(&plan, RunOptions::default()).await.unwrap();

    assert!(result.passed());
    assert_eq!(
        result.outputs.get("headlines").unwrap(),
        &vec!["Rust 2024 released".to_string(), "Tokio 2.0".to_string()]
    );
    assert!(result.artifacts.failure_screenshot_path.is_none());
}

#[tokio::test]
async fn explicit_selector_is_remembered_for_the_domain() {
    let dir = tempfile::tempdir().unwrap();
    let site = InMemorySite::new().with_page(
        "https://shop.test",
        FakePage::new("Shop").with(FakeElement::button("Buy").with_selector("#buy")),
    );
    let profiles = Arc::new(InMemorySiteProfileStore::new());
    let runner = orchestrator(&site, profiles.clone(), dir.path());
    let plan = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://shop.test/" },
            { "type": "click", "target": "Buy", "selector": "#buy" }
        ]
    }))
    .unwrap();

    let result = runner.run(&plan, RunOptions::default()).await.unwrap();

    assert!(result.passed());
    let profile = profiles.get("shop.test").unwrap();
    assert_eq!(profile.selector_for("Buy"), Some("#buy"));
}

#[tokio::test]
async fn missing_secret_fails_fill_without_typing() {
    let dir = tempfile::tempdir().unwrap();
    let site = InMemorySite::new().with_page(
        "https://app.test/login",
        FakePage::new("Login").with(FakeElement::input("Email")),
    );
    let runner = orchestrator(&site, Arc::new(InMemorySiteProfileStore::new()), dir.path())
        .with_secrets(Arc::new(StaticSecrets::from_pairs([("OTHER", "x")])));
    let plan = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://app.test/login" },
            { "type": "fill", "field": "Email", "value": "${SECRET:APP_EMAIL}" }
        ]
    }))
    .unwrap();

    let result = runner.run(&plan, RunOptions::default()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(
        result.failed_step().unwrap().error.as_deref(),
        Some("Missing secret value for APP_EMAIL")
    );
    assert!(!site
        .actions()
        .iter()
        .any(|action| matches!(action, FakeAction::Fill { .. })));
}

#[tokio::test]
async fn stored_plan_never_contains_resolved_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let site = InMemorySite::new().with_page(
        "https://app.test/login",
        FakePage::new("Login").with(FakeElement::input("Email")),
    );
    let runner = orchestrator(&site, Arc::new(InMemorySiteProfileStore::new()), dir.path())
        .with_secrets(Arc::new(StaticSecrets::from_pairs([("APP_EMAIL", "qa@example.com")])));
    let plan = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://app.test/login" },
            { "type": "fill", "field": "Email", "value": "${SECRET:APP_EMAIL}" }
        ]
    }))
    .unwrap();

    let result = runner.run(&plan, RunOptions::default()).await.unwrap();

    assert!(result.passed());
    assert!(site.actions().iter().any(|action| matches!(
        action,
        FakeAction::Fill { value, .. } if value == "qa@example.com"
    )));
    let stored = std::fs::read_to_string(&result.artifacts.result_path).unwrap();
    assert!(!stored.contains("qa@example.com"));
}

#[tokio::test]
async fn stored_plan_replays_with_its_secret_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let site = InMemorySite::new().with_page(
        "https://app.test/login",
        FakePage::new("Login").with(FakeElement::input("Email")),
    );
    let runner = orchestrator(&site, Arc::new(InMemorySiteProfileStore::new()), dir.path())
        .with_secrets(Arc::new(StaticSecrets::from_pairs([("APP_EMAIL", "qa@example.com")])));
    let plan = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://app.test/login" },
            { "type": "fill", "field": "Email", "value": "${SECRET:APP_EMAIL}" }
        ]
    }))
    .unwrap();

    let first = runner.run(&plan, RunOptions::default()).await.unwrap();
    let stored = runner.store().load_result(&first.run_id).await.unwrap();
    assert_eq!(stored.plan, plan);

    let replayed = runner.run(&stored.plan, RunOptions::default()).await.unwrap();

    assert!(replayed.passed());
    let typed: Vec<String> = site
        .actions()
        .into_iter()
        .filter_map(|action| match action {
            FakeAction::Fill { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(typed, vec!["qa@example.com".to_string(), "qa@example.com".to_string()]);
}

#[tokio::test]
async fn learned_selector_is_used_on_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let site = InMemorySite::new().with_page(
        "https://shop.test",
        FakePage::new("Shop").with(FakeElement::new("div").with_selector("#buy").with_text("Buy")),
    );
    let profiles = Arc::new(InMemorySiteProfileStore::new());
    let runner = orchestrator(&site, profiles.clone(), dir.path());

    let with_selector = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://shop.test" },
            { "type": "click", "target": "Checkout", "selector": "#buy" }
        ]
    }))
    .unwrap();
    assert!(runner.run(&with_selector, RunOptions::default()).await.unwrap().passed());

    // "Checkout" matches no heuristic on this page; only the remembered selector finds it.
    let without_selector = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://shop.test" },
            { "type": "click", "target": "Checkout" }
        ]
    }))
    .unwrap();
    let result = runner.run(&without_selector, RunOptions::default()).await.unwrap();

    assert!(result.passed());
    let clicks = site
        .actions()
        .into_iter()
        .filter(|action| matches!(action, FakeAction::Click(_)))
        .count();
    assert_eq!(clicks, 2);
    assert_eq!(profiles.get("shop.test").unwrap().selector_for("Checkout"), Some("#buy"));
}

#[tokio::test]
async fn cancelled_run_still_closes_the_browser() {
    let dir = tempfile::tempdir().unwrap();
    let site = InMemorySite::new().with_page(
        "https://shop.test",
        FakePage::new("Shop").with(FakeElement::button("Buy").with_selector("#buy")),
    );
    let profiles = Arc::new(InMemorySiteProfileStore::new());
    let runner = orchestrator(&site, profiles.clone(), dir.path());
    let plan = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": [
            { "type": "goto", "url": "https://shop.test" },
            { "type": "click", "target": "Buy", "selector": "#buy" },
            { "type": "waitFor", "timeoutMs": 5000 }
        ]
    }))
    .unwrap();
    let options = RunOptions {
        run_id: Some("run_cancelled".to_string()),
        dry_run: false,
    };

    let outcome = tokio::time::timeout(Duration::from_millis(300), runner.run(&plan, options)).await;
    assert!(outcome.is_err());
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(site.launches(), 1);
    assert_eq!(site.open_sessions(), 0);
    assert!(dir.path().join("run_cancelled").join("trace.zip").exists());
    assert_eq!(profiles.get("shop.test").unwrap().selector_for("Buy"), Some("#buy"));
    assert!(matches!(
        runner.store().load_result("run_cancelled").await,
        Err(RunError::NotFound(_))
    ));
}

#[tokio::test]
async fn invalid_plan_is_rejected_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let site = example_site();
    let runner = orchestrator(&site, Arc::new(InMemorySiteProfileStore::new()), dir.path());
    let plan = TestPlan::from_value(serde_json::json!({
        "version": "1",
        "steps": []
    }))
    .unwrap();

    let err = runner.run(&plan, RunOptions::default()).await.unwrap_err();

    assert!(matches!(err, RunError::Schema(_)));
    assert_eq!(site.launches(), 0);
}

struct BrokenLauncher;

#[async_trait]
impl BrowserLauncher for BrokenLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError> {
        Err(AdapterError::new(AdapterErrorKind::Launch).with_hint("no chrome binary"))
    }
}

#[tokio::test]
async fn launch_failure_writes_no_run_record() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RunOrchestrator::new(
        Arc::new(BrokenLauncher),
        Arc::new(InMemorySiteProfileStore::new()),
        RunStore::new(dir.path()),
    );
    let plan = TestPlan::from_json_str(EXAMPLE_PLAN).unwrap();

    let err = runner
        .run(
            &plan,
            RunOptions {
                run_id: Some("run_broken".to_string()),
                dry_run: false,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Launch(_)));
    assert!(matches!(
        runner.store().load_result("run_broken").await,
        Err(RunError::NotFound(_))
    ));
}
