//! Planner and repair collaborators.
//!
//! Adapters return raw, unvalidated JSON. Callers are expected to run plans
//! through `TestPlan::from_value` and patches through
//! `RepairPatch::from_value` before using them.

pub mod errors;
pub mod json;
pub mod mock;
pub mod openai;
pub mod types;

use std::sync::Arc;

pub use errors::AdvisorError;
pub use mock::{MockPlanner, MockRepair, DEFAULT_PLAN_URL, MOCK_REPAIR_TARGET};
pub use openai::{OpenAiClient, OpenAiConfig, OpenAiPlanner, OpenAiRepair};
pub use types::{PlanRequest, PlannerAdapter, Provider, RepairAdapter, RepairRequest};

/// Planner for `provider`. The OpenAI config is only consulted for
/// [`Provider::OpenAi`].
pub fn planner_for(
    provider: Provider,
    openai: impl FnOnce() -> Result<OpenAiConfig, AdvisorError>,
) -> Result<Arc<dyn PlannerAdapter>, AdvisorError> {
    Ok(match provider {
        Provider::Mock => Arc::new(MockPlanner),
        Provider::OpenAi => Arc::new(OpenAiPlanner::new(OpenAiClient::new(openai()?)?)),
    })
}

pub fn repair_adapter_for(
    provider: Provider,
    openai: impl FnOnce() -> Result<OpenAiConfig, AdvisorError>,
) -> Result<Arc<dyn RepairAdapter>, AdvisorError> {
    Ok(match provider {
        Provider::Mock => Arc::new(MockRepair),
        Provider::OpenAi => Arc::new(OpenAiRepair::new(OpenAiClient::new(openai()?)?)),
    })
}
