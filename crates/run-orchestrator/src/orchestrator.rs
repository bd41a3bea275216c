//! Run orchestrator implementation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_locator::{DefaultElementResolver, ElementResolver};
use cdp_adapter::{BrowserLauncher, BrowserSession, LaunchOptions};
use chrono::Utc;
use plan_schema::{compile_plan, CompiledStep, StepAction, TestPlan};
use secret_resolver::{ProcessEnvSecrets, SecretStore};
use site_profile::{domain_key, SiteProfile, SiteProfileStore};
use tokio::fs;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::actions::{execute_step, StepContext};
use crate::errors::RunError;
use crate::result::{RunArtifacts, RunResult, RunStatus, StepResult};
use crate::run_id::new_run_id;
use crate::store::{RunPaths, RunStore};

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DOM_SNAPSHOT_LIMIT: usize = 20_000;

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub step_timeout: Duration,
    pub launch: LaunchOptions,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            launch: LaunchOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub run_id: Option<String>,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn dry_run() -> Self {
        Self {
            run_id: None,
            dry_run: true,
        }
    }
}

/// Executes plans one at a time per call; separate calls may run concurrently.
#[derive(Clone)]
pub struct RunOrchestrator {
    launcher: Arc<dyn BrowserLauncher>,
    profiles: Arc<dyn SiteProfileStore>,
    secrets: Arc<dyn SecretStore>,
    resolver: Arc<dyn ElementResolver>,
    store: RunStore,
    settings: RunSettings,
}

impl RunOrchestrator {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        profiles: Arc<dyn SiteProfileStore>,
        store: RunStore,
    ) -> Self {
        Self {
            launcher,
            profiles,
            secrets: Arc::new(ProcessEnvSecrets),
            resolver: Arc::new(DefaultElementResolver::new()),
            store,
            settings: RunSettings::default(),
        }
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ElementResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Validate, compile and execute `plan`, persisting exactly one run record.
    pub async fn run(&self, plan: &TestPlan, options: RunOptions) -> Result<RunResult, RunError> {
        let compiled = compile_plan(plan)?;
        let run_id = options.run_id.unwrap_or_else(new_run_id);
        let paths = self.store.prepare(&run_id).await?;

        let result = if options.dry_run {
            info!(run_id = %run_id, steps = compiled.len(), "dry run");
            dry_run_result(&run_id, plan, &compiled, &paths)
        } else {
            self.run_live(&run_id, plan, &compiled, &paths).await?
        };

        self.store.write_result(&result).await?;
        info!(
            run_id = %result.run_id,
            status = result.status.as_str(),
            duration_ms = result.duration_ms,
            "run finished"
        );
        Ok(result)
    }

    async fn run_live(
        &self,
        run_id: &str,
        plan: &TestPlan,
        compiled: &[CompiledStep],
        paths: &RunPaths,
    ) -> Result<RunResult, RunError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let domain = domain_key(first_goto(compiled));
        let profile = self.profiles.load(&domain).await;
        debug!(run_id, domain = %domain, learned = profile.selectors.len(), "site profile loaded");

        let session = self
            .launcher
            .launch(&self.settings.launch)
            .await
            .map_err(RunError::Launch)?;
        let mut live = LiveSession {
            run_id: run_id.to_string(),
            session: Arc::from(session),
            trace_path: paths.trace.clone(),
            profiles: self.profiles.clone(),
            profile,
            finished: false,
        };
        if let Err(err) = live.session.start_trace().await {
            warn!(run_id, %err, "failed to start trace");
        }

        let mut steps = Vec::with_capacity(compiled.len());
        let mut outputs = BTreeMap::new();
        let mut status = RunStatus::Passed;
        let mut failure_screenshot_path = None;
        let mut failure_dom_path = None;

        for step in compiled {
            let step_clock = Instant::now();
            let record = StepResult::new(step);
            info!(
                run_id,
                step = step.index,
                kind = step.kind().as_str(),
                description = %step.description,
                "executing step"
            );

            let mut ctx = StepContext {
                session: live.session.as_ref(),
                resolver: self.resolver.as_ref(),
                secrets: self.secrets.as_ref(),
                profile: &mut live.profile,
                timeout: self.settings.step_timeout,
            };
            match execute_step(&mut ctx, step).await {
                Ok(extracted) => {
                    if let Some(extracted) = extracted {
                        outputs.insert(extracted.output_key, extracted.values);
                    }
                    steps.push(record.finish(elapsed_ms(step_clock)));
                }
                Err(err) => {
                    let duration_ms = elapsed_ms(step_clock);
                    warn!(run_id, step = step.index, error = %err, "step failed");
                    status = RunStatus::Failed;
                    let (screenshot, dom) =
                        capture_failure(live.session.as_ref(), paths, step.index).await;
                    steps.push(
                        record
                            .with_error(err.to_string(), vec![screenshot.clone(), dom.clone()])
                            .finish(duration_ms),
                    );
                    failure_screenshot_path = Some(screenshot);
                    failure_dom_path = Some(dom);
                    break;
                }
            }
        }

        live.finish().await;

        Ok(RunResult {
            run_id: run_id.to_string(),
            status,
            started_at,
            ended_at: Utc::now(),
            duration_ms: elapsed_ms(clock),
            plan: plan.clone(),
            steps,
            outputs,
            artifacts: RunArtifacts {
                run_dir: paths.run_dir.clone(),
                trace_path: paths.trace.clone(),
                result_path: paths.result.clone(),
                failure_screenshot_path,
                failure_dom_path,
            },
        })
    }
}

fn dry_run_result(
    run_id: &str,
    plan: &TestPlan,
    compiled: &[CompiledStep],
    paths: &RunPaths,
) -> RunResult {
    let now = Utc::now();
    RunResult {
        run_id: run_id.to_string(),
        status: RunStatus::Passed,
        started_at: now,
        ended_at: now,
        duration_ms: 0,
        plan: plan.clone(),
        steps: compiled.iter().map(StepResult::dry_run).collect(),
        outputs: BTreeMap::new(),
        artifacts: RunArtifacts {
            run_dir: paths.run_dir.clone(),
            trace_path: paths.trace.clone(),
            result_path: paths.result.clone(),
            failure_screenshot_path: None,
            failure_dom_path: None,
        },
    }
}

fn first_goto(compiled: &[CompiledStep]) -> Option<&str> {
    compiled.iter().find_map(|step| match &step.action {
        StepAction::Goto { url } => Some(url.as_str()),
        _ => None,
    })
}

fn elapsed_ms(clock: Instant) -> u64 {
    clock.elapsed().as_millis() as u64
}

/// Screenshot and DOM snapshot of the failing page. Write failures are
/// logged; the returned paths are recorded either way.
async fn capture_failure(
    session: &dyn BrowserSession,
    paths: &RunPaths,
    index: usize,
) -> (PathBuf, PathBuf) {
    let screenshot_path = paths.failure_screenshot(index);
    let dom_path = paths.failure_dom(index);

    match session.screenshot().await {
        Ok(bytes) => write_artifact(&screenshot_path, bytes).await,
        Err(err) => warn!(%err, path = %screenshot_path.display(), "failure screenshot unavailable"),
    }
    match session.content().await {
        Ok(html) => write_artifact(&dom_path, truncate_chars(&html, DOM_SNAPSHOT_LIMIT)).await,
        Err(err) => warn!(%err, path = %dom_path.display(), "failure DOM snapshot unavailable"),
    }

    (screenshot_path, dom_path)
}

async fn write_artifact(path: &Path, contents: impl AsRef<[u8]>) {
    if let Err(err) = fs::write(path, contents).await {
        warn!(?err, path = %path.display(), "failed to write artifact");
    }
}

/// Owns the browser session and site profile of a live run. Dropping it
/// before [`LiveSession::finish`] (a cancelled run future) still stops the
/// trace, closes the browser and saves the profile on a spawned task.
struct LiveSession {
    run_id: String,
    session: Arc<dyn BrowserSession>,
    trace_path: PathBuf,
    profiles: Arc<dyn SiteProfileStore>,
    profile: SiteProfile,
    finished: bool,
}

impl LiveSession {
    async fn finish(&mut self) {
        self.finished = true;
        close_session(&self.run_id, self.session.as_ref(), &self.trace_path).await;
        save_profile(&self.run_id, self.profiles.as_ref(), &mut self.profile).await;
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if Handle::try_current().is_err() {
            warn!(run_id = %self.run_id, "run dropped outside a runtime; browser session left open");
            return;
        }
        warn!(run_id = %self.run_id, "run cancelled; closing browser session");
        let run_id = self.run_id.clone();
        let session = self.session.clone();
        let trace_path = self.trace_path.clone();
        let profiles = self.profiles.clone();
        let mut profile = self.profile.clone();
        tokio::spawn(async move {
            close_session(&run_id, session.as_ref(), &trace_path).await;
            save_profile(&run_id, profiles.as_ref(), &mut profile).await;
        });
    }
}

async fn close_session(run_id: &str, session: &dyn BrowserSession, trace_path: &Path) {
    if let Err(err) = session.stop_trace(trace_path).await {
        warn!(run_id, %err, "failed to write trace");
    }
    if let Err(err) = session.close().await {
        warn!(run_id, %err, "failed to close browser session");
    }
}

async fn save_profile(run_id: &str, profiles: &dyn SiteProfileStore, profile: &mut SiteProfile) {
    profile.touch();
    if let Err(err) = profiles.save(profile).await {
        warn!(run_id, domain = %profile.domain, %err, "failed to persist site profile");
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
