//! Collaborator boundaries for plan generation and repair.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use plan_schema::TestPlan;
use run_orchestrator::RunResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AdvisorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub prompt: String,
    pub url: Option<String>,
}

impl PlanRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Everything a repair adapter gets to see about a failed run.
#[derive(Debug, Clone)]
pub struct RepairRequest {
    pub plan: TestPlan,
    pub run_result: RunResult,
    pub dom_snippet: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Produces an unvalidated candidate plan from a natural-language request.
#[async_trait]
pub trait PlannerAdapter: Send + Sync {
    async fn plan(&self, request: &PlanRequest) -> Result<Value, AdvisorError>;
}

/// Produces an unvalidated candidate repair patch for a failed run.
#[async_trait]
pub trait RepairAdapter: Send + Sync {
    async fn repair(&self, request: &RepairRequest) -> Result<Value, AdvisorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Mock,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Mock => "mock",
            Provider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AdvisorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Provider::Mock),
            "openai" => Ok(Provider::OpenAi),
            other => Err(AdvisorError::UnknownProvider(other.to_string())),
        }
    }
}
