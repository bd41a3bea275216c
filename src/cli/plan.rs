use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use plan_advisor::{planner_for, PlanRequest, Provider};
use plan_schema::TestPlan;
use tracing::info;

use crate::config::TestairConfig;

#[derive(Args, Clone)]
pub struct PlanArgs {
    /// What the test should do, in plain language
    pub prompt: String,

    /// Starting URL hint for the planner
    #[arg(long)]
    pub url: Option<String>,

    /// Planner provider (mock or openai)
    #[arg(long)]
    pub provider: Option<Provider>,
}

pub async fn cmd_plan(args: PlanArgs, config: &TestairConfig) -> Result<ExitCode> {
    let provider = args.provider.unwrap_or(config.repair.provider);
    let planner = planner_for(provider, || config.openai_config())
        .context("Failed to initialise planner")?;

    let mut request = PlanRequest::new(args.prompt);
    if let Some(url) = args.url {
        request = request.with_url(url);
    }

    let raw = planner.plan(&request).await.context("Planner request failed")?;
    let plan = TestPlan::from_value(raw).context("Planner produced an invalid plan")?;
    info!(provider = %provider, steps = plan.steps.len(), "plan generated");

    println!("{}", serde_json::to_string_pretty(&plan.redacted())?);
    Ok(ExitCode::SUCCESS)
}
