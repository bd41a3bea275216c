use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use secret_resolver::ProcessEnvSecrets;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::runtime::build_orchestrator;
use crate::config::TestairConfig;
use crate::server::{build_router, ServerState};

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn cmd_serve(args: ServeArgs, config: TestairConfig) -> Result<ExitCode> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let orchestrator = build_orchestrator(&config, Arc::new(ProcessEnvSecrets));
    let app = build_router(ServerState::new(orchestrator));

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    info!(
        "testair server listening on http://{}",
        listener.local_addr().context("Failed to read bound address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
