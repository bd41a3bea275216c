//! Plan compilation
//!
//! Lowers a validated [`TestPlan`] into the flat list of primitive steps the
//! runner executes. Macro steps (`login`) expand in place, so one authored step
//! may produce several compiled steps that all point back at it through
//! `source_step_index`.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::errors::SchemaValidationError;
use crate::plan::{ExpectStep, TestPlan, TestStep, WaitForStep};

pub const LOGIN_SUBMIT_TARGET: &str = "Sign in";
pub const POST_LOGIN_WAIT_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    Goto,
    Click,
    Fill,
    Expect,
    WaitFor,
    ExtractTextList,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Goto => "goto",
            StepKind::Click => "click",
            StepKind::Fill => "fill",
            StepKind::Expect => "expect",
            StepKind::WaitFor => "waitFor",
            StepKind::ExtractTextList => "extractTextList",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectCondition {
    TextVisible(String),
    UrlIncludes(String),
    ElementVisible(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    TextVisible(String),
    Selector(String),
    Duration(u64),
}

/// Primitive action of a compiled step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Goto {
        url: String,
    },
    Click {
        target: String,
        selector: Option<String>,
    },
    Fill {
        field: String,
        value: String,
        selector: Option<String>,
    },
    Expect {
        condition: ExpectCondition,
        timeout_ms: Option<u64>,
    },
    WaitFor(WaitCondition),
    ExtractTextList {
        selector: String,
        output_key: String,
        limit: u32,
    },
}

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            StepAction::Goto { .. } => StepKind::Goto,
            StepAction::Click { .. } => StepKind::Click,
            StepAction::Fill { .. } => StepKind::Fill,
            StepAction::Expect { .. } => StepKind::Expect,
            StepAction::WaitFor(_) => StepKind::WaitFor,
            StepAction::ExtractTextList { .. } => StepKind::ExtractTextList,
        }
    }

    /// Ordered key/value view of the action, as shown in dry runs and run results.
    ///
    /// Absent selectors are rendered as empty strings.
    pub fn payload(&self) -> Payload {
        let mut payload = Payload::default();
        match self {
            StepAction::Goto { url } => payload.text("url", url),
            StepAction::Click { target, selector } => {
                payload.text("target", target);
                payload.text("selector", selector.as_deref().unwrap_or_default());
            }
            StepAction::Fill {
                field,
                value,
                selector,
            } => {
                payload.text("field", field);
                payload.text("value", value);
                payload.text("selector", selector.as_deref().unwrap_or_default());
            }
            StepAction::Expect {
                condition,
                timeout_ms,
            } => {
                match condition {
                    ExpectCondition::TextVisible(text) => payload.text("textVisible", text),
                    ExpectCondition::UrlIncludes(fragment) => payload.text("urlIncludes", fragment),
                    ExpectCondition::ElementVisible(selector) => {
                        payload.text("elementVisible", selector)
                    }
                }
                if let Some(ms) = timeout_ms {
                    payload.number("timeoutMs", *ms);
                }
            }
            StepAction::WaitFor(condition) => match condition {
                WaitCondition::TextVisible(text) => payload.text("textVisible", text),
                WaitCondition::Selector(selector) => payload.text("selector", selector),
                WaitCondition::Duration(ms) => payload.number("timeoutMs", *ms),
            },
            StepAction::ExtractTextList {
                selector,
                output_key,
                limit,
            } => {
                payload.text("selector", selector);
                payload.number("limit", u64::from(*limit));
                payload.text("outputKey", output_key);
            }
        }
        payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadValue {
    Text(String),
    Number(u64),
}

impl PayloadValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::Text(text) => Some(text),
            PayloadValue::Number(_) => None,
        }
    }

    fn is_empty_text(&self) -> bool {
        matches!(self, PayloadValue::Text(text) if text.is_empty())
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Text(text) => write!(f, "{}", serde_json::Value::String(text.clone())),
            PayloadValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for PayloadValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PayloadValue::Text(text) => serializer.serialize_str(text),
            PayloadValue::Number(n) => serializer.serialize_u64(*n),
        }
    }
}

/// Insertion-ordered payload map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    entries: Vec<(&'static str, PayloadValue)>,
}

impl Payload {
    fn text(&mut self, key: &'static str, value: &str) {
        self.entries.push((key, PayloadValue::Text(value.to_string())));
    }

    fn number(&mut self, key: &'static str, value: u64) {
        self.entries.push((key, PayloadValue::Number(value)));
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PayloadValue)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStep {
    pub index: usize,
    pub source_step_index: usize,
    pub action: StepAction,
    pub description: String,
}

impl Serialize for CompiledStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CompiledStepView::from(self).serialize(serializer)
    }
}

impl CompiledStep {
    fn new(index: usize, source_step_index: usize, action: StepAction, description: String) -> Self {
        Self {
            index,
            source_step_index,
            action,
            description,
        }
    }

    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }

    pub fn payload(&self) -> Payload {
        self.action.payload()
    }

    /// `N. type(key="value", ...)`, omitting empty string values.
    pub fn dry_run_line(&self) -> String {
        let args = self
            .payload()
            .iter()
            .filter(|(_, value)| !value.is_empty_text())
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}. {}({})", self.index + 1, self.kind(), args)
    }
}

/// Serialized form of a compiled step including its payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledStepView<'a> {
    pub index: usize,
    pub source_step_index: usize,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub description: &'a str,
    pub payload: Payload,
}

impl<'a> From<&'a CompiledStep> for CompiledStepView<'a> {
    fn from(step: &'a CompiledStep) -> Self {
        Self {
            index: step.index,
            source_step_index: step.source_step_index,
            kind: step.kind(),
            description: &step.description,
            payload: step.payload(),
        }
    }
}

/// Compile a plan into primitive steps.
///
/// The plan is validated first. Output indices are contiguous from 0 and the
/// result depends only on the plan.
pub fn compile_plan(plan: &TestPlan) -> Result<Vec<CompiledStep>, SchemaValidationError> {
    plan.validate()?;

    let mut compiled = Vec::with_capacity(plan.steps.len());
    for (source_index, step) in plan.steps.iter().enumerate() {
        let mut push = |action: StepAction, description: String| {
            let index = compiled.len();
            compiled.push(CompiledStep::new(index, source_index, action, description));
        };
        match step {
            TestStep::Goto(goto) => push(
                StepAction::Goto {
                    url: goto.url.clone(),
                },
                format!("goto {}", goto.url),
            ),
            TestStep::Click(click) => push(
                StepAction::Click {
                    target: click.target.trim().to_string(),
                    selector: click.selector.clone(),
                },
                format!("click {}", click.target),
            ),
            TestStep::Fill(fill) => push(
                StepAction::Fill {
                    field: fill.field.trim().to_string(),
                    value: fill.value.clone(),
                    selector: fill.selector.clone(),
                },
                format!("fill {}", fill.field),
            ),
            TestStep::Expect(expect) => push(
                StepAction::Expect {
                    condition: expect_condition(source_index, expect)?,
                    timeout_ms: expect.timeout_ms,
                },
                "expect condition".to_string(),
            ),
            TestStep::Login(login) => {
                push(
                    StepAction::Fill {
                        field: "username".to_string(),
                        value: login.username.clone(),
                        selector: None,
                    },
                    "login username".to_string(),
                );
                push(
                    StepAction::Fill {
                        field: "password".to_string(),
                        value: login.password.clone(),
                        selector: None,
                    },
                    "login password".to_string(),
                );
                push(
                    StepAction::Click {
                        target: LOGIN_SUBMIT_TARGET.to_string(),
                        selector: None,
                    },
                    "login submit".to_string(),
                );
                push(
                    StepAction::WaitFor(WaitCondition::Duration(POST_LOGIN_WAIT_MS)),
                    "wait for post-login navigation".to_string(),
                );
            }
            TestStep::WaitFor(wait) => push(
                StepAction::WaitFor(wait_condition(source_index, wait)?),
                "wait for condition".to_string(),
            ),
            TestStep::ExtractTextList(extract) => push(
                StepAction::ExtractTextList {
                    selector: extract.selector.clone(),
                    output_key: extract.output_key.clone(),
                    limit: extract.effective_limit(),
                },
                format!("extract text list {}", extract.output_key),
            ),
        }
    }

    tracing::debug!(
        authored = plan.steps.len(),
        compiled = compiled.len(),
        "compiled plan"
    );
    Ok(compiled)
}

/// Dry-run rendering of a compiled plan, one line per step.
pub fn dry_run_lines(steps: &[CompiledStep]) -> Vec<String> {
    steps.iter().map(CompiledStep::dry_run_line).collect()
}

fn expect_condition(
    index: usize,
    expect: &ExpectStep,
) -> Result<ExpectCondition, SchemaValidationError> {
    match (&expect.text_visible, &expect.url_includes, &expect.element_visible) {
        (Some(text), None, None) => Ok(ExpectCondition::TextVisible(text.clone())),
        (None, Some(fragment), None) => Ok(ExpectCondition::UrlIncludes(fragment.clone())),
        (None, None, Some(selector)) => Ok(ExpectCondition::ElementVisible(selector.clone())),
        _ => Err(SchemaValidationError::new(
            format!("steps[{index}]"),
            "expect step must set exactly one condition",
        )),
    }
}

fn wait_condition(index: usize, wait: &WaitForStep) -> Result<WaitCondition, SchemaValidationError> {
    match (&wait.text_visible, &wait.selector, wait.timeout_ms) {
        (Some(text), None, None) => Ok(WaitCondition::TextVisible(text.clone())),
        (None, Some(selector), None) => Ok(WaitCondition::Selector(selector.clone())),
        (None, None, Some(ms)) => Ok(WaitCondition::Duration(ms)),
        _ => Err(SchemaValidationError::new(
            format!("steps[{index}]"),
            "waitFor step must set exactly one condition",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plan(steps: serde_json::Value) -> TestPlan {
        TestPlan::from_value(json!({ "version": "1", "steps": steps })).unwrap()
    }

    #[test]
    fn login_expands_into_four_steps() {
        let plan = plan(json!([
            { "type": "goto", "url": "https://app.test/login" },
            { "type": "login", "username": "${SECRET:USERNAME}", "password": "${SECRET:PASSWORD}" },
            { "type": "expect", "urlIncludes": "dashboard" }
        ]));
        let compiled = compile_plan(&plan).unwrap();

        assert_eq!(compiled.len(), 6);
        let indices: Vec<_> = compiled.iter().map(|step| step.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        let sources: Vec<_> = compiled.iter().map(|step| step.source_step_index).collect();
        assert_eq!(sources, vec![0, 1, 1, 1, 1, 2]);

        assert_eq!(
            compiled[1].action,
            StepAction::Fill {
                field: "username".into(),
                value: "${SECRET:USERNAME}".into(),
                selector: None,
            }
        );
        assert_eq!(
            compiled[3].action,
            StepAction::Click {
                target: "Sign in".into(),
                selector: None
            }
        );
        assert_eq!(
            compiled[4].action,
            StepAction::WaitFor(WaitCondition::Duration(2000))
        );
        assert_eq!(compiled[4].description, "wait for post-login navigation");
    }

    #[test]
    fn compilation_is_deterministic() {
        let plan = plan(json!([
            { "type": "goto", "url": "https://example.com" },
            { "type": "click", "target": "More information" },
            { "type": "extractTextList", "selector": "li", "outputKey": "items" }
        ]));
        assert_eq!(compile_plan(&plan).unwrap(), compile_plan(&plan).unwrap());
    }

    #[test]
    fn dry_run_lines_skip_empty_values() {
        let plan = plan(json!([
            { "type": "goto", "url": "https://example.com" },
            { "type": "click", "target": "More information" },
            { "type": "expect", "textVisible": "Example Domain", "timeoutMs": 500 },
            { "type": "extractTextList", "selector": "li a", "outputKey": "links", "limit": 3 }
        ]));
        let lines = dry_run_lines(&compile_plan(&plan).unwrap());
        assert_eq!(
            lines,
            vec![
                "1. goto(url=\"https://example.com\")".to_string(),
                "2. click(target=\"More information\")".to_string(),
                "3. expect(textVisible=\"Example Domain\", timeoutMs=500)".to_string(),
                "4. extractTextList(selector=\"li a\", limit=3, outputKey=\"links\")".to_string(),
            ]
        );
    }

    #[test]
    fn click_target_is_trimmed_but_description_is_not() {
        let plan = plan(json!([{ "type": "click", "target": "  Submit " }]));
        let compiled = compile_plan(&plan).unwrap();
        assert_eq!(
            compiled[0].payload().get("target"),
            Some(&PayloadValue::Text("Submit".into()))
        );
        assert_eq!(compiled[0].description, "click   Submit ");
    }

    #[test]
    fn extract_limit_defaults_to_five() {
        let plan = plan(json!([{ "type": "extractTextList", "selector": "li", "outputKey": "items" }]));
        let compiled = compile_plan(&plan).unwrap();
        assert_eq!(compiled[0].payload().get("limit"), Some(&PayloadValue::Number(5)));
    }

    #[test]
    fn compiled_view_serializes_payload() {
        let plan = plan(json!([{ "type": "waitFor", "selector": "#ready" }]));
        let compiled = compile_plan(&plan).unwrap();
        let value = serde_json::to_value(&compiled[0]).unwrap();
        assert_eq!(
            value,
            json!({
                "index": 0,
                "sourceStepIndex": 0,
                "type": "waitFor",
                "description": "wait for condition",
                "payload": { "selector": "#ready" }
            })
        );
    }

    #[test]
    fn invalid_plan_is_not_compiled() {
        let plan = TestPlan {
            version: "1".into(),
            name: None,
            base_url: None,
            steps: vec![],
        };
        assert!(compile_plan(&plan).is_err());
    }
}
