//! OpenAI-compatible chat completion adapters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use run_orchestrator::RunResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::AdvisorError;
use crate::json::extract_json_object;
use crate::types::{PlanRequest, PlannerAdapter, RepairAdapter, RepairRequest};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DOM_SNIPPET_LIMIT: usize = 2_000;

const PATCH_PATHS: &str =
    "/steps/{index}/target|selector|field|value|url|textVisible|urlIncludes|elementVisible|timeoutMs";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Defaults with the key taken from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, AdvisorError> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
            .ok_or(AdvisorError::MissingApiKey(API_KEY_ENV))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Shared HTTP plumbing for the planner and repair adapters.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AdvisorError> {
        if config.api_key.trim().is_empty() {
            return Err(AdvisorError::MissingApiKey(API_KEY_ENV));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| AdvisorError::Client(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn complete_json(&self, system: &str, user: String) -> Result<Value, AdvisorError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: &self.config.model,
            temperature: 0.0,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        debug!(model = %self.config.model, url = %url, "requesting chat completion");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            warn!(status, "chat completion rejected");
            return Err(AdvisorError::Status { status, body });
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| self.request_error(err))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AdvisorError::MissingContent)?;
        let object = extract_json_object(&content)
            .ok_or_else(|| AdvisorError::InvalidJson("no JSON object in reply".to_string()))?;
        serde_json::from_str(object).map_err(|err| AdvisorError::InvalidJson(err.to_string()))
    }

    fn request_error(&self, err: reqwest::Error) -> AdvisorError {
        if err.is_timeout() {
            AdvisorError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            AdvisorError::Request(err.to_string())
        }
    }
}

const PLANNER_SYSTEM: &str = "You generate deterministic website test plans as JSON. \
Output raw JSON only, no markdown and no prose.";

const REPAIR_SYSTEM: &str = "You repair website test plans by returning a minimal, safe JSON \
patch object. Output raw JSON only, no markdown and no comments.";

pub struct OpenAiPlanner {
    client: OpenAiClient,
}

impl OpenAiPlanner {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlannerAdapter for OpenAiPlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<Value, AdvisorError> {
        let mut lines = vec![format!("Natural language test request: {}", request.prompt)];
        if let Some(url) = &request.url {
            lines.push(format!("URL hint: {url}"));
        }
        lines.extend([
            "Return ONLY a JSON test plan with version \"1\" and at least one step.".to_string(),
            "Step types: goto{url}, click{target, selector?}, fill{field, value, selector?}, \
             expect{textVisible|urlIncludes|elementVisible, timeoutMs?}, login{username, password}, \
             waitFor{textVisible|selector|timeoutMs}, extractTextList{selector, outputKey, limit?}."
                .to_string(),
            "Use ${SECRET:NAME} placeholders for credentials, never real values.".to_string(),
            "Top-level keys: [\"version\",\"name\",\"baseUrl\",\"steps\"]".to_string(),
        ]);
        self.client.complete_json(PLANNER_SYSTEM, lines.join("\n")).await
    }
}

pub struct OpenAiRepair {
    client: OpenAiClient,
}

impl OpenAiRepair {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RepairAdapter for OpenAiRepair {
    async fn repair(&self, request: &RepairRequest) -> Result<Value, AdvisorError> {
        let plan = serde_json::to_string_pretty(&request.plan)
            .map_err(|err| AdvisorError::InvalidJson(err.to_string()))?;
        let mut sections = vec![
            "Given a failed deterministic browser run, return a constrained JSON patch object."
                .to_string(),
            "Allowed ops: add, replace".to_string(),
            format!("Allowed paths: {PATCH_PATHS}"),
            "Step indices refer to the authored plan below (sourceStepIndex), not compiled steps."
                .to_string(),
            "Return ONLY JSON shaped { \"reason\": string, \"operations\": [{ \"op\", \"path\", \"value\" }] } \
             with at most 8 operations."
                .to_string(),
            format!("Current plan:\n{plan}"),
            format!("Failure summary:\n{}", failure_summary(&request.run_result)),
        ];
        if let Some(dom) = &request.dom_snippet {
            sections.push(format!("DOM snippet:\n{}", truncate_chars(dom, DOM_SNIPPET_LIMIT)));
        }
        if let Some(path) = &request.screenshot_path {
            sections.push(format!("Screenshot path: {}", path.display()));
        }
        self.client
            .complete_json(REPAIR_SYSTEM, sections.join("\n\n"))
            .await
    }
}

fn failure_summary(run: &RunResult) -> String {
    let Some(failed) = run.failed_step() else {
        return "No failed step in run result.".to_string();
    };
    let summary = json!({
        "runId": run.run_id,
        "failedStep": {
            "index": failed.index,
            "sourceStepIndex": failed.source_step_index,
            "type": failed.kind,
            "description": failed.description,
            "error": failed.error,
        }
    });
    serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string())
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            OpenAiClient::new(OpenAiConfig::new("  ")),
            Err(AdvisorError::MissingApiKey(API_KEY_ENV))
        ));
    }

    #[test]
    fn snippet_is_cut_at_the_limit() {
        let dom = "é".repeat(DOM_SNIPPET_LIMIT + 10);
        assert_eq!(truncate_chars(&dom, DOM_SNIPPET_LIMIT).chars().count(), DOM_SNIPPET_LIMIT);
    }
}
