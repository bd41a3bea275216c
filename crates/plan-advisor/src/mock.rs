//! Deterministic offline adapters.

use async_trait::async_trait;
use plan_schema::StepKind;
use serde_json::{json, Value};

use crate::errors::AdvisorError;
use crate::types::{PlanRequest, PlannerAdapter, RepairAdapter, RepairRequest};

pub const DEFAULT_PLAN_URL: &str = "https://example.com";
pub const MOCK_REPAIR_TARGET: &str = "Submit";

/// Keyword planner: prompts mentioning "login" get a login flow, anything
/// else a public page check.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPlanner;

#[async_trait]
impl PlannerAdapter for MockPlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<Value, AdvisorError> {
        let url = request.url.as_deref().unwrap_or(DEFAULT_PLAN_URL);
        let plan = if request.prompt.to_lowercase().contains("login") {
            json!({
                "version": "1",
                "name": "Mock login flow",
                "steps": [
                    { "type": "goto", "url": url },
                    { "type": "login", "username": "${SECRET:USERNAME}", "password": "${SECRET:PASSWORD}" },
                    { "type": "expect", "urlIncludes": "dashboard" }
                ]
            })
        } else {
            json!({
                "version": "1",
                "name": "Mock public flow",
                "steps": [
                    { "type": "goto", "url": url },
                    { "type": "expect", "textVisible": "Example Domain" }
                ]
            })
        };
        Ok(plan)
    }
}

/// Renames the target of a failed click to "Submit"; any other failure gets
/// an empty patch.
///
/// The patch addresses the authored step (`sourceStepIndex`), not the compiled
/// step index, so failures inside or after an expanded login still point at
/// the step the author wrote.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRepair;

#[async_trait]
impl RepairAdapter for MockRepair {
    async fn repair(&self, request: &RepairRequest) -> Result<Value, AdvisorError> {
        let Some(failed) = request.run_result.failed_step() else {
            return Ok(json!({ "reason": "No failure detected", "operations": [] }));
        };
        let operations = if failed.is_kind(StepKind::Click) {
            vec![json!({
                "op": "replace",
                "path": format!("/steps/{}/target", failed.source_step_index),
                "value": MOCK_REPAIR_TARGET,
            })]
        } else {
            Vec::new()
        };
        Ok(json!({
            "reason": "Fallback target refinement for the failed step",
            "operations": operations,
        }))
    }
}
