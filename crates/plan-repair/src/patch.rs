//! Repair patch documents

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::errors::PatchRejected;

pub const MAX_OPERATIONS: usize = 8;

static PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^/steps/(\d+)/(target|selector|field|value|url|textVisible|urlIncludes|elementVisible|timeoutMs)$",
    )
    .expect("patch path pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Replace,
    Add,
}

impl FromStr for PatchOp {
    type Err = PatchRejected;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "replace" => Ok(PatchOp::Replace),
            "add" => Ok(PatchOp::Add),
            other => Err(PatchRejected::UnsupportedOp(other.to_string())),
        }
    }
}

/// Leaf step fields a patch may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchField {
    Target,
    Selector,
    Field,
    Value,
    Url,
    TextVisible,
    UrlIncludes,
    ElementVisible,
    TimeoutMs,
}

impl PatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchField::Target => "target",
            PatchField::Selector => "selector",
            PatchField::Field => "field",
            PatchField::Value => "value",
            PatchField::Url => "url",
            PatchField::TextVisible => "textVisible",
            PatchField::UrlIncludes => "urlIncludes",
            PatchField::ElementVisible => "elementVisible",
            PatchField::TimeoutMs => "timeoutMs",
        }
    }

    fn from_wire(raw: &str) -> Option<Self> {
        Some(match raw {
            "target" => PatchField::Target,
            "selector" => PatchField::Selector,
            "field" => PatchField::Field,
            "value" => PatchField::Value,
            "url" => PatchField::Url,
            "textVisible" => PatchField::TextVisible,
            "urlIncludes" => PatchField::UrlIncludes,
            "elementVisible" => PatchField::ElementVisible,
            "timeoutMs" => PatchField::TimeoutMs,
            _ => return None,
        })
    }
}

/// `/steps/{index}/{field}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchPath {
    pub step_index: usize,
    pub field: PatchField,
}

impl PatchPath {
    pub fn new(step_index: usize, field: PatchField) -> Self {
        Self { step_index, field }
    }
}

impl fmt::Display for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/steps/{}/{}", self.step_index, self.field.as_str())
    }
}

impl FromStr for PatchPath {
    type Err = PatchRejected;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let rejected = || PatchRejected::PathNotAllowed(raw.to_string());
        let captures = PATH_PATTERN.captures(raw).ok_or_else(rejected)?;
        let step_index = captures[1].parse::<usize>().map_err(|_| rejected())?;
        let field = PatchField::from_wire(&captures[2]).ok_or_else(rejected)?;
        Ok(Self { step_index, field })
    }
}

impl Serialize for PatchPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    Text(String),
    Count(u64),
}

impl PatchValue {
    pub fn to_json(&self) -> Value {
        match self {
            PatchValue::Text(text) => Value::String(text.clone()),
            PatchValue::Count(count) => Value::from(*count),
        }
    }
}

impl From<&str> for PatchValue {
    fn from(text: &str) -> Self {
        PatchValue::Text(text.to_string())
    }
}

impl From<u64> for PatchValue {
    fn from(count: u64) -> Self {
        PatchValue::Count(count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: PatchPath,
    pub value: PatchValue,
}

impl PatchOperation {
    pub fn replace(path: PatchPath, value: impl Into<PatchValue>) -> Self {
        Self {
            op: PatchOp::Replace,
            path,
            value: value.into(),
        }
    }
}

/// A checked repair suggestion. Construct from untrusted JSON with
/// [`RepairPatch::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairPatch {
    pub reason: String,
    pub operations: Vec<PatchOperation>,
}

#[derive(Deserialize)]
struct RawPatch {
    reason: Value,
    operations: Vec<RawOperation>,
}

#[derive(Deserialize)]
struct RawOperation {
    op: String,
    path: String,
    value: Value,
}

impl RepairPatch {
    pub fn new(reason: impl Into<String>, operations: Vec<PatchOperation>) -> Self {
        Self {
            reason: reason.into(),
            operations,
        }
    }

    /// Decode a candidate patch, rejecting the whole document on the first
    /// violation.
    pub fn from_value(value: Value) -> Result<Self, PatchRejected> {
        let raw: RawPatch =
            serde_json::from_value(value).map_err(|err| PatchRejected::Malformed(err.to_string()))?;

        let reason = match raw.reason {
            Value::String(reason) if !reason.trim().is_empty() => reason,
            _ => return Err(PatchRejected::EmptyReason),
        };
        if raw.operations.len() > MAX_OPERATIONS {
            return Err(PatchRejected::TooManyOperations {
                count: raw.operations.len(),
                max: MAX_OPERATIONS,
            });
        }

        let operations = raw
            .operations
            .into_iter()
            .map(|raw_op| {
                let op = raw_op.op.parse::<PatchOp>()?;
                let path = raw_op.path.parse::<PatchPath>()?;
                let value = match raw_op.value {
                    Value::String(text) => PatchValue::Text(text),
                    Value::Number(number) => number
                        .as_u64()
                        .map(PatchValue::Count)
                        .ok_or_else(|| PatchRejected::InvalidValue {
                            path: path.to_string(),
                        })?,
                    _ => {
                        return Err(PatchRejected::InvalidValue {
                            path: path.to_string(),
                        })
                    }
                };
                Ok(PatchOperation { op, path, value })
            })
            .collect::<Result<Vec<_>, PatchRejected>>()?;

        Ok(Self { reason, operations })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
