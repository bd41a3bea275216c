//! Filesystem layout of runs under the artifacts root.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::RunError;
use crate::result::RunResult;
use crate::run_id::is_valid_run_id;

pub const RESULT_FILE: &str = "RunResult.json";
pub const TRACE_FILE: &str = "trace.zip";

/// Paths owned by a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub run_dir: PathBuf,
    pub trace: PathBuf,
    pub result: PathBuf,
}

impl RunPaths {
    pub fn failure_screenshot(&self, compiled_index: usize) -> PathBuf {
        self.run_dir
            .join(format!("failure-step-{}.png", compiled_index + 1))
    }

    pub fn failure_dom(&self, compiled_index: usize) -> PathBuf {
        self.run_dir
            .join(format!("failure-step-{}.dom.html", compiled_index + 1))
    }

    pub fn repaired_plan(&self, attempt: u32) -> PathBuf {
        self.run_dir.join(format!("plan.repaired.{attempt}.json"))
    }
}

/// Simple filesystem-backed store for run records and artifacts.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self, run_id: &str) -> Result<RunPaths, RunError> {
        if !is_valid_run_id(run_id) {
            return Err(RunError::InvalidRunId(run_id.to_string()));
        }
        let run_dir = self.root.join(run_id);
        Ok(RunPaths {
            trace: run_dir.join(TRACE_FILE),
            result: run_dir.join(RESULT_FILE),
            run_dir,
        })
    }

    /// Create the run directory.
    pub async fn prepare(&self, run_id: &str) -> Result<RunPaths, RunError> {
        let paths = self.paths(run_id)?;
        fs::create_dir_all(&paths.run_dir)
            .await
            .map_err(|err| RunError::io(&paths.run_dir, err))?;
        Ok(paths)
    }

    pub async fn write_result(&self, result: &RunResult) -> Result<PathBuf, RunError> {
        let path = result.artifacts.result_path.clone();
        let payload = serde_json::to_vec_pretty(result)?;
        fs::write(&path, payload)
            .await
            .map_err(|err| RunError::io(&path, err))?;
        debug!(run_id = %result.run_id, path = %path.display(), "run result written");
        Ok(path)
    }

    pub async fn load_result(&self, run_id: &str) -> Result<RunResult, RunError> {
        let paths = self.paths(run_id)?;
        let bytes = match fs::read(&paths.result).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunError::NotFound(run_id.to_string()))
            }
            Err(err) => return Err(RunError::io(&paths.result, err)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Path of a named artifact inside a run directory. Names that would
    /// escape the directory are rejected.
    pub fn artifact_path(&self, run_id: &str, name: &str) -> Result<PathBuf, RunError> {
        let paths = self.paths(run_id)?;
        let relative = Path::new(name);
        let plain = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(RunError::InvalidArtifactName(name.to_string()));
        }
        Ok(paths.run_dir.join(relative))
    }

    pub async fn write_json<T: serde::Serialize>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), RunError> {
        let payload = serde_json::to_vec_pretty(value)?;
        fs::write(path, payload)
            .await
            .map_err(|err| RunError::io(path, err))
    }
}
