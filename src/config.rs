//! Workspace configuration.
//!
//! Values come from a YAML file, then environment overrides, then command
//! line flags (applied by the individual commands).

use std::path::PathBuf;
use std::time::Duration;

use cdp_adapter::LaunchOptions;
use plan_advisor::{AdvisorError, OpenAiConfig, Provider};
use run_orchestrator::RunSettings;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ARTIFACTS_ROOT_ENV: &str = "TESTAIR_ARTIFACTS_ROOT";
pub const HEADLESS_ENV: &str = "TESTAIR_HEADLESS";
pub const OPENAI_MODEL_ENV: &str = "TESTAIR_OPENAI_MODEL";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OPENAI_TIMEOUT_ENV: &str = "TESTAIR_OPENAI_TIMEOUT_MS";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestairConfig {
    pub artifacts_root: PathBuf,
    /// Defaults to `<artifacts_root>/site-profiles`.
    pub site_profiles_root: Option<PathBuf>,
    pub browser: BrowserSection,
    pub run: RunSection,
    pub repair: RepairSection,
    pub openai: OpenAiSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub step_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSection {
    pub attempts: u32,
    pub provider: Provider,
    /// Bound on a single repair adapter call.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for TestairConfig {
    fn default() -> Self {
        Self {
            artifacts_root: PathBuf::from("runs"),
            site_profiles_root: None,
            browser: BrowserSection::default(),
            run: RunSection::default(),
            repair: RepairSection::default(),
            openai: OpenAiSection::default(),
            server: ServerSection::default(),
        }
    }
}

impl Default for BrowserSection {
    fn default() -> Self {
        let launch = LaunchOptions::default();
        Self {
            headless: launch.headless,
            executable: launch.executable,
            window_width: launch.window_width,
            window_height: launch.window_height,
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            step_timeout_ms: run_orchestrator::DEFAULT_STEP_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for RepairSection {
    fn default() -> Self {
        Self {
            attempts: 0,
            provider: Provider::Mock,
            timeout_ms: plan_advisor::openai::DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            model: plan_advisor::openai::DEFAULT_MODEL.to_string(),
            base_url: plan_advisor::openai::DEFAULT_API_BASE.to_string(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

impl TestairConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Apply `TESTAIR_*`, `OPENAI_BASE_URL` and `PORT` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(root) = lookup(ARTIFACTS_ROOT_ENV) {
            self.artifacts_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(HEADLESS_ENV) {
            match parse_bool(&raw) {
                Some(headless) => self.browser.headless = headless,
                None => warn!(value = %raw, "ignoring {HEADLESS_ENV}; expected true or false"),
            }
        }
        if let Some(model) = lookup(OPENAI_MODEL_ENV) {
            self.openai.model = model;
        }
        if let Some(base_url) = lookup(OPENAI_BASE_URL_ENV) {
            self.openai.base_url = base_url;
        }
        if let Some(raw) = lookup(OPENAI_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.repair.timeout_ms = ms,
                _ => warn!(value = %raw, "ignoring {OPENAI_TIMEOUT_ENV}; expected milliseconds"),
            }
        }
        if let Some(raw) = lookup(PORT_ENV) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %raw, "ignoring {PORT_ENV}; expected a port number"),
            }
        }
    }

    pub fn site_profiles_root(&self) -> PathBuf {
        self.site_profiles_root
            .clone()
            .unwrap_or_else(|| self.artifacts_root.join("site-profiles"))
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.browser.headless,
            executable: self.browser.executable.clone(),
            window_width: self.browser.window_width,
            window_height: self.browser.window_height,
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            step_timeout: Duration::from_millis(self.run.step_timeout_ms),
            launch: self.launch_options(),
        }
    }

    pub fn repair_timeout(&self) -> Duration {
        Duration::from_millis(self.repair.timeout_ms)
    }

    /// OpenAI client settings; the API key always comes from `OPENAI_API_KEY`.
    pub fn openai_config(&self) -> Result<OpenAiConfig, AdvisorError> {
        Ok(OpenAiConfig::from_env()?
            .with_model(self.openai.model.clone())
            .with_api_base(self.openai.base_url.clone())
            .with_timeout(self.repair_timeout()))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = TestairConfig::from_yaml(
            "artifacts_root: out\nbrowser:\n  headless: false\nrepair:\n  attempts: 2\n  provider: openai\n",
        )
        .unwrap();
        assert_eq!(config.artifacts_root, PathBuf::from("out"));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.window_width, 1280);
        assert_eq!(config.repair.attempts, 2);
        assert_eq!(config.repair.provider, Provider::OpenAi);
        assert_eq!(config.run.step_timeout_ms, 10_000);
        assert_eq!(config.site_profiles_root(), PathBuf::from("out/site-profiles"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ARTIFACTS_ROOT_ENV, "/tmp/runs"),
            (HEADLESS_ENV, "false"),
            (OPENAI_TIMEOUT_ENV, "1500"),
            (PORT_ENV, "not-a-port"),
        ]);
        let mut config = TestairConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.artifacts_root, PathBuf::from("/tmp/runs"));
        assert!(!config.browser.headless);
        assert_eq!(config.repair_timeout(), Duration::from_millis(1500));
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    #[serial]
    fn process_environment_is_consulted() {
        std::env::set_var(OPENAI_MODEL_ENV, "gpt-test");
        let mut config = TestairConfig::default();
        config.apply_env_overrides();
        std::env::remove_var(OPENAI_MODEL_ENV);
        assert_eq!(config.openai.model, "gpt-test");
    }
}
