use thiserror::Error;

/// First violated constraint of a plan document.
///
/// `path` points at the offending field (`steps[2].target`) or `$` when the
/// document could not be decoded at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid plan at {path}: {message}")]
pub struct SchemaValidationError {
    pub path: String,
    pub message: String,
}

impl SchemaValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn step(index: usize, field: &str, message: impl Into<String>) -> Self {
        Self::new(format!("steps[{index}].{field}"), message)
    }

    pub(crate) fn decode(err: serde_json::Error) -> Self {
        Self::new("$", err.to_string())
    }
}
