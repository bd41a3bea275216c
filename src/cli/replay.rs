use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use run_orchestrator::RunStore;

use super::output::{print_lines, replay_lines};
use crate::config::TestairConfig;

#[derive(Args, Clone)]
pub struct ReplayArgs {
    /// Run ID (folder under the artifacts root)
    pub run_id: String,

    /// Root output directory for run artifacts
    #[arg(long)]
    pub artifacts_root: Option<PathBuf>,
}

pub async fn cmd_replay(args: ReplayArgs, config: &TestairConfig) -> Result<ExitCode> {
    let root = args
        .artifacts_root
        .unwrap_or_else(|| config.artifacts_root.clone());
    let result = RunStore::new(root)
        .load_result(&args.run_id)
        .await
        .with_context(|| format!("Failed to load run {}", args.run_id))?;
    print_lines(&replay_lines(&result));
    Ok(ExitCode::SUCCESS)
}
