//! Execution of a single compiled step against a browser session.

use std::time::Duration;

use action_locator::{ElementResolver, LocateRequest};
use cdp_adapter::{BrowserSession, ElementQuery, ElementState};
use plan_schema::{CompiledStep, ExpectCondition, StepAction, WaitCondition};
use secret_resolver::{resolve_placeholders, SecretStore};
use site_profile::SiteProfile;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::errors::StepError;

/// Values produced by an `extractTextList` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub output_key: String,
    pub values: Vec<String>,
}

pub(crate) struct StepContext<'a> {
    pub session: &'a dyn BrowserSession,
    pub resolver: &'a dyn ElementResolver,
    pub secrets: &'a dyn SecretStore,
    pub profile: &'a mut SiteProfile,
    pub timeout: Duration,
}

pub(crate) async fn execute_step(
    ctx: &mut StepContext<'_>,
    step: &CompiledStep,
) -> Result<Option<Extracted>, StepError> {
    let deadline = Instant::now() + ctx.timeout;
    let timeout_ms = ctx.timeout.as_millis() as u64;

    match &step.action {
        StepAction::Goto { url } => {
            ctx.session
                .goto(url, ctx.timeout)
                .await
                .map_err(|err| StepError::from_adapter("goto", timeout_ms, err))?;
            Ok(None)
        }
        StepAction::Click { target, selector } => {
            let request = LocateRequest::new(target, selector.as_deref(), ctx.timeout);
            let resolved = ctx
                .resolver
                .resolve(ctx.session, &request, ctx.profile)
                .await?;
            let remaining = remaining_until(deadline, "click", timeout_ms)?;
            ctx.session
                .click(&resolved.selector, remaining)
                .await
                .map_err(|err| StepError::from_adapter("click", timeout_ms, err))?;
            Ok(None)
        }
        StepAction::Fill {
            field,
            value,
            selector,
        } => {
            let resolved_value = resolve_placeholders(value, ctx.secrets)?;
            let request = LocateRequest::new(field, selector.as_deref(), ctx.timeout);
            let resolved = ctx
                .resolver
                .resolve(ctx.session, &request, ctx.profile)
                .await?;
            let remaining = remaining_until(deadline, "fill", timeout_ms)?;
            debug!(field = %field, strategy = resolved.strategy().name(), "filling field");
            ctx.session
                .fill(&resolved.selector, &resolved_value, remaining)
                .await
                .map_err(|err| StepError::from_adapter("fill", timeout_ms, err))?;
            Ok(None)
        }
        StepAction::Expect {
            condition,
            timeout_ms: own_timeout,
        } => {
            let limit = own_timeout.map(Duration::from_millis).unwrap_or(ctx.timeout);
            let limit_ms = limit.as_millis() as u64;
            let outcome = match condition {
                ExpectCondition::TextVisible(text) => ctx
                    .session
                    .wait_for(&ElementQuery::text(text, false), ElementState::Visible, limit)
                    .await
                    .map(|_| ()),
                ExpectCondition::UrlIncludes(fragment) => {
                    ctx.session.wait_for_url(fragment, limit).await
                }
                ExpectCondition::ElementVisible(selector) => ctx
                    .session
                    .wait_for(&ElementQuery::css(selector), ElementState::Visible, limit)
                    .await
                    .map(|_| ()),
            };
            outcome.map_err(|err| StepError::from_adapter("expect", limit_ms, err))?;
            Ok(None)
        }
        StepAction::WaitFor(condition) => {
            match condition {
                WaitCondition::TextVisible(text) => {
                    ctx.session
                        .wait_for(&ElementQuery::text(text, false), ElementState::Visible, ctx.timeout)
                        .await
                        .map_err(|err| StepError::from_adapter("waitFor", timeout_ms, err))?;
                }
                WaitCondition::Selector(selector) => {
                    ctx.session
                        .wait_for(&ElementQuery::css(selector), ElementState::Attached, ctx.timeout)
                        .await
                        .map_err(|err| StepError::from_adapter("waitFor", timeout_ms, err))?;
                }
                WaitCondition::Duration(ms) => sleep(Duration::from_millis(*ms)).await,
            }
            Ok(None)
        }
        StepAction::ExtractTextList {
            selector,
            output_key,
            limit,
        } => {
            let texts = match timeout(ctx.timeout, ctx.session.inner_texts(selector)).await {
                Ok(result) => result
                    .map_err(|err| StepError::from_adapter("extractTextList", timeout_ms, err))?,
                Err(_) => {
                    return Err(StepError::ActionTimeout {
                        action: "extractTextList",
                        timeout_ms,
                        detail: format!("reading {selector}"),
                    })
                }
            };
            Ok(Some(Extracted {
                output_key: output_key.clone(),
                values: normalize_texts(texts, *limit as usize),
            }))
        }
    }
}

fn remaining_until(
    deadline: Instant,
    action: &'static str,
    timeout_ms: u64,
) -> Result<Duration, StepError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(StepError::ActionTimeout {
            action,
            timeout_ms,
            detail: "no time left after resolving the target".to_string(),
        });
    }
    Ok(remaining)
}

/// Looks at the first `limit` matches, collapsing whitespace and dropping
/// entries that end up empty.
pub(crate) fn normalize_texts(texts: Vec<String>, limit: usize) -> Vec<String> {
    texts
        .into_iter()
        .take(limit)
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect()
}
