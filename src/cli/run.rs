use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use plan_advisor::{repair_adapter_for, Provider};
use plan_schema::{compile_plan, dry_run_lines};
use run_orchestrator::RunOptions;
use tracing::info;

use super::output::{print_lines, summary_lines};
use super::runtime::{build_orchestrator, load_secrets, read_plan};
use crate::config::TestairConfig;
use crate::repair::RepairLoop;

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Plan file (JSON)
    pub plan: PathBuf,

    /// Env file providing secret values (KEY=VALUE lines)
    #[arg(long, value_name = "FILE")]
    pub env: Option<PathBuf>,

    /// Print compiled steps and record a passing run without a browser
    #[arg(long)]
    pub dry_run: bool,

    /// Root output directory for run artifacts
    #[arg(long)]
    pub artifacts_root: Option<PathBuf>,

    /// Repair attempts after a failed run
    #[arg(long)]
    pub repair_attempts: Option<u32>,

    /// Repair provider (mock or openai)
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Default per-step timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl RunArgs {
    fn apply_to(&self, config: &mut TestairConfig) {
        if let Some(root) = &self.artifacts_root {
            config.artifacts_root = root.clone();
        }
        if let Some(attempts) = self.repair_attempts {
            config.repair.attempts = attempts;
        }
        if let Some(provider) = self.provider {
            config.repair.provider = provider;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.run.step_timeout_ms = timeout_ms;
        }
    }
}

pub async fn cmd_run(args: RunArgs, mut config: TestairConfig) -> Result<ExitCode> {
    args.apply_to(&mut config);
    let plan = read_plan(&args.plan).await?;

    if args.dry_run {
        let compiled = compile_plan(&plan)?;
        print_lines(&dry_run_lines(&compiled));
    }

    let secrets = load_secrets(args.env.as_deref())?;
    let orchestrator = build_orchestrator(&config, secrets);
    let options = RunOptions {
        run_id: None,
        dry_run: args.dry_run,
    };

    let result = if config.repair.attempts > 0 && !args.dry_run {
        let adapter = repair_adapter_for(config.repair.provider, || config.openai_config())
            .context("Failed to initialise repair adapter")?;
        let outcome = RepairLoop::new(
            orchestrator,
            adapter,
            config.repair.attempts,
            config.repair_timeout(),
        )
        .run(&plan, options)
        .await?;
        info!(
            run_id = %outcome.result.run_id,
            attempts = outcome.attempts,
            "repair loop finished"
        );
        outcome.result
    } else {
        orchestrator.run(&plan, options).await?
    };

    print_lines(&summary_lines(&result));
    Ok(if result.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
