//! Plan document model and validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::errors::SchemaValidationError;

pub const PLAN_VERSION: &str = "1";
pub const EXPECT_TIMEOUT_MAX_MS: u64 = 60_000;
pub const WAIT_TIMEOUT_MAX_MS: u64 = 120_000;
pub const EXTRACT_LIMIT_DEFAULT: u32 = 5;
pub const EXTRACT_LIMIT_MAX: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlan {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub steps: Vec<TestStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TestStep {
    Goto(GotoStep),
    Click(ClickStep),
    Fill(FillStep),
    Expect(ExpectStep),
    Login(LoginStep),
    WaitFor(WaitForStep),
    ExtractTextList(ExtractTextListStep),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoStep {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickStep {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillStep {
    pub field: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_visible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_includes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_visible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStep {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_visible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractTextListStep {
    pub selector: String,
    pub output_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ExtractTextListStep {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(EXTRACT_LIMIT_DEFAULT)
    }
}

impl TestStep {
    /// Wire name of the step kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            TestStep::Goto(_) => "goto",
            TestStep::Click(_) => "click",
            TestStep::Fill(_) => "fill",
            TestStep::Expect(_) => "expect",
            TestStep::Login(_) => "login",
            TestStep::WaitFor(_) => "waitFor",
            TestStep::ExtractTextList(_) => "extractTextList",
        }
    }
}

impl TestPlan {
    /// Decode and validate a plan from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, SchemaValidationError> {
        let plan: TestPlan = serde_json::from_value(value).map_err(SchemaValidationError::decode)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Decode and validate a plan from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaValidationError> {
        let plan: TestPlan = serde_json::from_str(text).map_err(SchemaValidationError::decode)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn to_value(&self) -> Value {
        // Every field is a string, integer or nested struct, so this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Check every constraint of the grammar, reporting the first violation.
    pub fn validate(&self) -> Result<(), SchemaValidationError> {
        if self.version != PLAN_VERSION {
            return Err(SchemaValidationError::new(
                "version",
                format!("expected \"{PLAN_VERSION}\", got \"{}\"", self.version),
            ));
        }
        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(SchemaValidationError::new("name", "must not be empty"));
            }
        }
        if let Some(base_url) = &self.base_url {
            if Url::parse(base_url).is_err() {
                return Err(SchemaValidationError::new("baseUrl", "must be a valid URL"));
            }
        }
        if self.steps.is_empty() {
            return Err(SchemaValidationError::new(
                "steps",
                "must contain at least one step",
            ));
        }
        for (index, step) in self.steps.iter().enumerate() {
            validate_step(index, step)?;
        }
        Ok(())
    }

    /// URL of the first navigation step, if any.
    pub fn first_goto_url(&self) -> Option<&str> {
        self.steps.iter().find_map(|step| match step {
            TestStep::Goto(goto) => Some(goto.url.as_str()),
            _ => None,
        })
    }
}

fn validate_step(index: usize, step: &TestStep) -> Result<(), SchemaValidationError> {
    match step {
        TestStep::Goto(goto) => {
            require_text(index, "url", &goto.url)?;
            if Url::parse(&goto.url).is_err() {
                return Err(SchemaValidationError::step(index, "url", "must be a valid URL"));
            }
        }
        TestStep::Click(click) => {
            require_label(index, "target", &click.target)?;
            optional_text(index, "selector", click.selector.as_deref())?;
        }
        TestStep::Fill(fill) => {
            require_label(index, "field", &fill.field)?;
            require_text(index, "value", &fill.value)?;
            optional_text(index, "selector", fill.selector.as_deref())?;
        }
        TestStep::Expect(expect) => {
            optional_text(index, "textVisible", expect.text_visible.as_deref())?;
            optional_text(index, "urlIncludes", expect.url_includes.as_deref())?;
            optional_text(index, "elementVisible", expect.element_visible.as_deref())?;
            let set = [
                expect.text_visible.is_some(),
                expect.url_includes.is_some(),
                expect.element_visible.is_some(),
            ]
            .into_iter()
            .filter(|present| *present)
            .count();
            if set != 1 {
                return Err(SchemaValidationError::new(
                    format!("steps[{index}]"),
                    "expect step must set exactly one of textVisible, urlIncludes, or elementVisible",
                ));
            }
            timeout_within(index, expect.timeout_ms, EXPECT_TIMEOUT_MAX_MS)?;
        }
        TestStep::Login(login) => {
            require_text(index, "username", &login.username)?;
            require_text(index, "password", &login.password)?;
        }
        TestStep::WaitFor(wait) => {
            optional_text(index, "textVisible", wait.text_visible.as_deref())?;
            optional_text(index, "selector", wait.selector.as_deref())?;
            timeout_within(index, wait.timeout_ms, WAIT_TIMEOUT_MAX_MS)?;
            let set = [
                wait.text_visible.is_some(),
                wait.selector.is_some(),
                wait.timeout_ms.is_some(),
            ]
            .into_iter()
            .filter(|present| *present)
            .count();
            if set != 1 {
                return Err(SchemaValidationError::new(
                    format!("steps[{index}]"),
                    "waitFor step must set exactly one of textVisible, selector, or timeoutMs",
                ));
            }
        }
        TestStep::ExtractTextList(extract) => {
            require_text(index, "selector", &extract.selector)?;
            require_text(index, "outputKey", &extract.output_key)?;
            if let Some(limit) = extract.limit {
                if limit == 0 || limit > EXTRACT_LIMIT_MAX {
                    return Err(SchemaValidationError::step(
                        index,
                        "limit",
                        format!("must be between 1 and {EXTRACT_LIMIT_MAX}"),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn require_text(index: usize, field: &str, value: &str) -> Result<(), SchemaValidationError> {
    if value.is_empty() {
        return Err(SchemaValidationError::step(index, field, "must not be empty"));
    }
    Ok(())
}

/// Labels are matched against visible text after trimming, so blanks are rejected too.
fn require_label(index: usize, field: &str, value: &str) -> Result<(), SchemaValidationError> {
    if value.trim().is_empty() {
        return Err(SchemaValidationError::step(index, field, "must not be blank"));
    }
    Ok(())
}

fn optional_text(
    index: usize,
    field: &str,
    value: Option<&str>,
) -> Result<(), SchemaValidationError> {
    match value {
        Some(value) => require_text(index, field, value),
        None => Ok(()),
    }
}

fn timeout_within(index: usize, timeout_ms: Option<u64>, max: u64) -> Result<(), SchemaValidationError> {
    match timeout_ms {
        Some(ms) if ms == 0 || ms > max => Err(SchemaValidationError::step(
            index,
            "timeoutMs",
            format!("must be between 1 and {max}"),
        )),
        _ => Ok(()),
    }
}
