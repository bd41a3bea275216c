use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<ExitCode> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_format)?;
    debug!("Starting testair v{}", env!("CARGO_PKG_VERSION"));

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    if let Some(path) = &path {
        debug!(path = %path.display(), "configuration loaded");
    }

    match dispatch(&cli, config).await {
        Ok(code) => Ok(code),
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
