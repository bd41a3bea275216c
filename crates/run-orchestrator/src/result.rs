//! Run records

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use plan_schema::{CompiledStep, StepKind, TestPlan};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub index: usize,
    pub source_step_index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_paths: Vec<PathBuf>,
}

impl StepResult {
    pub fn new(step: &CompiledStep) -> Self {
        let now = Utc::now();
        Self {
            index: step.index,
            source_step_index: step.source_step_index,
            kind: step.kind().as_str().to_string(),
            description: step.description.clone(),
            status: StepStatus::Passed,
            started_at: now,
            ended_at: now,
            duration_ms: 0,
            error: None,
            artifact_paths: Vec::new(),
        }
    }

    /// Passed placeholder used by dry runs.
    pub fn dry_run(step: &CompiledStep) -> Self {
        let mut result = Self::new(step);
        result.description = format!("DRY RUN: {}", step.description);
        result
    }

    pub fn with_error(mut self, error: String, artifact_paths: Vec<PathBuf>) -> Self {
        self.status = StepStatus::Failed;
        self.error = Some(error);
        self.artifact_paths = artifact_paths;
        self
    }

    /// Set finish time and duration.
    pub fn finish(mut self, duration_ms: u64) -> Self {
        self.ended_at = Utc::now();
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_kind(&self, kind: StepKind) -> bool {
        self.kind == kind.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifacts {
    pub run_dir: PathBuf,
    pub trace_path: PathBuf,
    pub result_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_screenshot_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_dom_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// The executed plan. Secret placeholders are kept as written, never resolved.
    pub plan: TestPlan,
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Vec<String>>,
    pub artifacts: RunArtifacts,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|step| step.status == StepStatus::Failed)
    }
}
