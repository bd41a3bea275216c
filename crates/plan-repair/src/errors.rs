//! Patch rejection reasons

use plan_schema::SchemaValidationError;
use thiserror::Error;

/// Why a candidate patch was refused. A rejected patch is never partially
/// applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchRejected {
    #[error("patch is not a repair document: {0}")]
    Malformed(String),

    #[error("patch reason must be a non-empty string")]
    EmptyReason,

    #[error("patch has {count} operations, at most {max} are allowed")]
    TooManyOperations { count: usize, max: usize },

    #[error("unsupported patch op {0:?}")]
    UnsupportedOp(String),

    #[error("patch path {0:?} is not allowed")]
    PathNotAllowed(String),

    #[error("value for {path} must be a string or a non-negative integer")]
    InvalidValue { path: String },

    #[error("step index {index} is out of range for a plan with {len} steps")]
    StepOutOfRange { index: usize, len: usize },

    /// Stricter than path syntax alone: the field must exist on the addressed step's variant.
    #[error("{path} does not address a field of a {kind} step")]
    FieldNotOnStep { path: String, kind: &'static str },

    #[error("patched plan is invalid: {0}")]
    InvalidResult(#[from] SchemaValidationError),
}
