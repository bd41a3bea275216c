use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use plan_schema::{compile_plan, dry_run_lines};

use super::output::print_lines;
use super::runtime::read_plan;

#[derive(Args, Clone)]
pub struct CompileArgs {
    /// Plan file (JSON)
    pub plan: PathBuf,
}

pub async fn cmd_compile(args: CompileArgs) -> Result<ExitCode> {
    let plan = read_plan(&args.plan).await?;
    let compiled = compile_plan(&plan)?;
    print_lines(&dry_run_lines(&compiled));
    Ok(ExitCode::SUCCESS)
}
