//! Repair loop around the run orchestrator.
//!
//! After a failed live run the loop asks a [`RepairAdapter`] for a patch,
//! applies it to the current plan and re-runs the whole plan on a fresh
//! session. It stops on a passing run, when attempts are exhausted, or when
//! the adapter returns a patch with no operations.

use std::sync::Arc;
use std::time::Duration;

use plan_advisor::{RepairAdapter, RepairRequest};
use plan_repair::{apply_patch, RepairPatch};
use plan_schema::TestPlan;
use run_orchestrator::{RunError, RunOptions, RunOrchestrator, RunResult};
use tokio::fs;
use tokio::time::timeout;
use tracing::{info, warn};

/// Final state of a run with repairs.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// Result of the last run executed.
    pub result: RunResult,
    /// Plan used by the last run.
    pub plan: TestPlan,
    /// Repair attempts consumed.
    pub attempts: u32,
}

pub struct RepairLoop {
    orchestrator: RunOrchestrator,
    adapter: Arc<dyn RepairAdapter>,
    max_attempts: u32,
    adapter_timeout: Duration,
}

impl RepairLoop {
    pub fn new(
        orchestrator: RunOrchestrator,
        adapter: Arc<dyn RepairAdapter>,
        max_attempts: u32,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            adapter,
            max_attempts,
            adapter_timeout,
        }
    }

    pub async fn run(&self, plan: &TestPlan, options: RunOptions) -> Result<RepairOutcome, RunError> {
        let dry_run = options.dry_run;
        let mut current_plan = plan.clone();
        let mut result = self.orchestrator.run(&current_plan, options).await?;
        let mut attempts = 0;

        while !result.passed() && !dry_run && attempts < self.max_attempts {
            attempts += 1;
            let run_id = result.run_id.clone();

            let Some(patch) = self.request_patch(&current_plan, &result, attempts).await else {
                continue;
            };
            if patch.is_empty() {
                info!(run_id = %run_id, attempt = attempts, "repair produced no operations");
                break;
            }

            let repaired = match apply_patch(&current_plan, &patch) {
                Ok(repaired) => repaired,
                Err(err) => {
                    warn!(run_id = %run_id, attempt = attempts, error = %err, "repair patch rejected");
                    continue;
                }
            };
            info!(
                run_id = %run_id,
                attempt = attempts,
                operations = patch.operations.len(),
                reason = %patch.reason,
                "applying repair patch"
            );

            self.write_snapshot(&run_id, attempts, &repaired).await;
            current_plan = repaired;
            result = self
                .orchestrator
                .run(&current_plan, RunOptions::default())
                .await?;
        }

        Ok(RepairOutcome {
            result,
            plan: current_plan,
            attempts,
        })
    }

    /// Ask the adapter for a patch. Adapter errors, timeouts and malformed
    /// patches are logged and yield `None`.
    async fn request_patch(
        &self,
        plan: &TestPlan,
        result: &RunResult,
        attempt: u32,
    ) -> Option<RepairPatch> {
        let dom_snippet = match &result.artifacts.failure_dom_path {
            Some(path) => fs::read_to_string(path).await.unwrap_or_default(),
            None => String::new(),
        };
        let request = RepairRequest {
            plan: plan.clone(),
            run_result: result.clone(),
            dom_snippet: Some(dom_snippet),
            screenshot_path: result.artifacts.failure_screenshot_path.clone(),
        };

        let raw = match timeout(self.adapter_timeout, self.adapter.repair(&request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                warn!(run_id = %result.run_id, attempt, error = %err, "repair adapter failed");
                return None;
            }
            Err(_) => {
                warn!(
                    run_id = %result.run_id,
                    attempt,
                    timeout_ms = self.adapter_timeout.as_millis() as u64,
                    "repair adapter timed out"
                );
                return None;
            }
        };

        match RepairPatch::from_value(raw) {
            Ok(patch) => Some(patch),
            Err(err) => {
                warn!(run_id = %result.run_id, attempt, error = %err, "repair patch rejected");
                None
            }
        }
    }

    async fn write_snapshot(&self, run_id: &str, attempt: u32, plan: &TestPlan) {
        let store = self.orchestrator.store();
        let path = match store.paths(run_id) {
            Ok(paths) => paths.repaired_plan(attempt),
            Err(err) => {
                warn!(run_id, %err, "cannot locate run directory for repaired plan");
                return;
            }
        };
        if let Err(err) = store.write_json(&path, &plan.redacted()).await {
            warn!(run_id, %err, "failed to write repaired plan");
        }
    }
}
