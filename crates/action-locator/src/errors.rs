//! Error types for locator system

use cdp_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No candidate attached before the step timeout ran out
    #[error("Could not resolve target \"{target}\" after trying {attempted} strategies")]
    NotFound { target: String, attempted: usize },

    /// The label itself is unusable
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Browser failure outside of a probe
    #[error("Browser error while resolving \"{target}\": {source}")]
    Browser {
        target: String,
        #[source]
        source: AdapterError,
    },
}

impl LocatorError {
    pub fn target(&self) -> Option<&str> {
        match self {
            LocatorError::NotFound { target, .. } | LocatorError::Browser { target, .. } => {
                Some(target)
            }
            LocatorError::InvalidTarget(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::NotFound { .. } | LocatorError::Browser { .. })
    }

    /// Error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Browser { .. } => 2,
            LocatorError::NotFound { .. } => 1,
            LocatorError::InvalidTarget(_) => 0,
        }
    }
}
