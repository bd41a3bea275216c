use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("wait timed out")]
    WaitTimeout,
    #[error("target element not found")]
    TargetNotFound,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("browser launch failed")]
    Launch,
    #[error("i/o failure")]
    Io,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            AdapterErrorKind::NavTimeout | AdapterErrorKind::WaitTimeout
        )
    }

    pub(crate) fn cdp(err: impl fmt::Display) -> Self {
        Self::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
    }
}
