//! Run and step error types

use std::path::PathBuf;

use action_locator::LocatorError;
use cdp_adapter::AdapterError;
use plan_schema::SchemaValidationError;
use secret_resolver::SecretError;
use thiserror::Error;

/// Why a single compiled step failed. Always fatal to the run.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("{action} timed out after {timeout_ms}ms: {detail}")]
    ActionTimeout {
        action: &'static str,
        timeout_ms: u64,
        detail: String,
    },

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("{action} failed: {source}")]
    Browser {
        action: &'static str,
        #[source]
        source: AdapterError,
    },
}

impl StepError {
    pub(crate) fn from_adapter(action: &'static str, timeout_ms: u64, err: AdapterError) -> Self {
        if err.is_timeout() {
            StepError::ActionTimeout {
                action,
                timeout_ms,
                detail: err.hint.unwrap_or_else(|| err.kind.to_string()),
            }
        } else {
            StepError::Browser {
                action,
                source: err,
            }
        }
    }
}

/// Failures that prevent a run from producing its record.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error("failed to start browser session: {0}")]
    Launch(#[source] AdapterError),

    #[error("artifact i/o failed for {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode run result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("run {0} not found")]
    NotFound(String),

    #[error("invalid run id {0:?}")]
    InvalidRunId(String),

    #[error("invalid artifact name {0:?}")]
    InvalidArtifactName(String),
}

impl RunError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunError::ArtifactIo {
            path: path.into(),
            source,
        }
    }
}
