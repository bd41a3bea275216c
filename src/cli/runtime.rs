use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cdp_adapter::ChromiumLauncher;
use plan_schema::TestPlan;
use run_orchestrator::{RunOrchestrator, RunStore};
use secret_resolver::{EnvFileSecrets, ProcessEnvSecrets, SecretStore};
use site_profile::FsSiteProfileStore;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::env::LogFormat;
use crate::config::TestairConfig;

pub fn init_logging(level: &str, debug: bool, format: LogFormat) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    // stdout carries command output; logs go to stderr.
    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}

pub struct LoadedConfig {
    pub config: TestairConfig,
    pub path: Option<PathBuf>,
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        }
        None => {
            // Priority: ./config/testair.yaml > ~/.config/testair/config.yaml
            let local_config = PathBuf::from("config/testair.yaml");
            if local_config.exists() {
                Some(local_config)
            } else {
                dirs::config_dir()
                    .map(|dir| dir.join("testair").join("config.yaml"))
                    .filter(|path| path.exists())
            }
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = TestairConfig::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => TestairConfig::default(),
    };
    config.apply_env_overrides();

    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}

/// Secrets from `env_file` with the process environment as fallback.
pub fn load_secrets(env_file: Option<&Path>) -> Result<Arc<dyn SecretStore>> {
    match env_file {
        Some(path) => {
            let secrets = EnvFileSecrets::load(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
            Ok(Arc::new(secrets))
        }
        None => Ok(Arc::new(ProcessEnvSecrets)),
    }
}

pub fn build_orchestrator(config: &TestairConfig, secrets: Arc<dyn SecretStore>) -> RunOrchestrator {
    RunOrchestrator::new(
        Arc::new(ChromiumLauncher),
        Arc::new(FsSiteProfileStore::new(config.site_profiles_root())),
        RunStore::new(config.artifacts_root.clone()),
    )
    .with_secrets(secrets)
    .with_settings(config.run_settings())
}

pub async fn read_plan(path: &Path) -> Result<TestPlan> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    TestPlan::from_json_str(&text).with_context(|| format!("Invalid plan {}", path.display()))
}
