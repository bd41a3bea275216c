use std::process::ExitCode;

use anyhow::Result;

use super::commands::Commands;
use super::compile::cmd_compile;
use super::env::CliArgs;
use super::plan::cmd_plan;
use super::replay::cmd_replay;
use super::run::cmd_run;
use super::serve::cmd_serve;
use crate::config::TestairConfig;

pub async fn dispatch(cli: &CliArgs, config: TestairConfig) -> Result<ExitCode> {
    match cli.command.clone() {
        Commands::Plan(args) => cmd_plan(args, &config).await,
        Commands::Run(args) => cmd_run(args, config).await,
        Commands::Replay(args) => cmd_replay(args, &config).await,
        Commands::Compile(args) => cmd_compile(args).await,
        Commands::Serve(args) => cmd_serve(args, config).await,
    }
}
