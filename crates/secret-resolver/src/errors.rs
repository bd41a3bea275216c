use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SecretError {
    /// A placeholder referenced a name the store does not hold
    #[error("Missing secret value for {0}")]
    Missing(String),

    #[error("failed to read env file {path}: {reason}")]
    EnvFile { path: PathBuf, reason: String },
}
