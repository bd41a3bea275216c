//! Chromium DevTools implementation of the browser capability.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LaunchOptions;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::query::{ElementQuery, ElementState};
use crate::scripts::{self, LocateOutcome};
use crate::session::{BrowserLauncher, BrowserSession};
use crate::trace::TraceRecorder;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const CHROME_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-breakpad",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-sync",
    "--metrics-recording-only",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--use-mock-keychain",
];

/// Launches a fresh Chromium process per session, each with a private profile directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError> {
        let session = ChromiumSession::launch(options).await?;
        Ok(Box::new(session))
    }
}

pub struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    trace: TraceRecorder,
    _profile_dir: TempDir,
}

impl ChromiumSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, AdapterError> {
        let profile_dir = tempfile::Builder::new()
            .prefix("testair-profile-")
            .tempdir()
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Launch)
                    .with_hint(format!("failed to create user-data-dir: {err}"))
            })?;

        let config = browser_config(options, profile_dir.path())?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Launch)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", ?err, "browser handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(AdapterError::cdp)?;

        info!(
            target: "cdp-adapter",
            headless = options.headless,
            profile = %profile_dir.path().display(),
            "chromium session started"
        );

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            trace: TraceRecorder::new(),
            _profile_dir: profile_dir,
        })
    }

    async fn evaluate(&self, script: &str) -> Result<Value, AdapterError> {
        let result = self
            .page
            .evaluate(script.to_string())
            .await
            .map_err(AdapterError::cdp)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn locate(
        &self,
        query: &ElementQuery,
        state: ElementState,
        wait: Duration,
    ) -> Result<String, AdapterError> {
        let deadline = Instant::now() + wait;
        let token = format!("a-{}", Uuid::new_v4().simple());
        let script = scripts::locate_script(query, state, &token);
        loop {
            match self.evaluate(&script).await {
                Ok(value) => match scripts::parse_locate_outcome(&value) {
                    LocateOutcome::Found(selector) => return Ok(selector),
                    LocateOutcome::Invalid(message) => {
                        return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                            .with_hint(format!("{query}: {message}")))
                    }
                    LocateOutcome::NotFound => {}
                },
                // The execution context is torn down while a navigation is in flight.
                Err(err) => debug!(target: "cdp-adapter", %err, "locate probe failed; retrying"),
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::WaitTimeout).with_hint(format!(
                    "{query} not {} after {}ms",
                    state.as_str(),
                    wait.as_millis()
                )));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

fn browser_config(options: &LaunchOptions, profile_dir: &Path) -> Result<BrowserConfig, AdapterError> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_secs(30))
        .launch_timeout(Duration::from_secs(20))
        .window_size(options.window_width, options.window_height)
        .user_data_dir(profile_dir)
        .args(CHROME_ARGS.iter().copied());

    if !options.headless {
        builder = builder.with_head();
    }

    match options.resolve_executable() {
        Some(executable) => builder = builder.chrome_executable(executable),
        None => warn!(
            target: "cdp-adapter",
            "no chrome executable detected; relying on chromiumoxide discovery"
        ),
    }

    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Launch).with_hint(format!("browser config error: {err}"))
    })
}

async fn bounded<T, E, F>(
    limit: Duration,
    kind: AdapterErrorKind,
    what: &str,
    fut: F,
) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(AdapterError::cdp(err)),
        Err(_) => Err(AdapterError::new(kind)
            .with_hint(format!("{what} after {}ms", limit.as_millis()))),
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&self, url: &str, limit: Duration) -> Result<(), AdapterError> {
        let outcome = bounded(limit, AdapterErrorKind::NavTimeout, url, async {
            self.page.goto(url).await.map(|_| ())
        })
        .await;
        self.trace.record("goto", url, &outcome);
        outcome
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(AdapterError::cdp)?
            .unwrap_or_default())
    }

    async fn wait_for(
        &self,
        query: &ElementQuery,
        state: ElementState,
        limit: Duration,
    ) -> Result<String, AdapterError> {
        let outcome = self.locate(query, state, limit).await;
        self.trace
            .record(&format!("wait {}", state.as_str()), &query.to_string(), &outcome);
        outcome
    }

    async fn wait_for_url(&self, fragment: &str, limit: Duration) -> Result<(), AdapterError> {
        let deadline = Instant::now() + limit;
        let outcome = loop {
            match self.current_url().await {
                Ok(url) if url.contains(fragment) => break Ok(()),
                Ok(_) => {}
                Err(err) => debug!(target: "cdp-adapter", %err, "url probe failed; retrying"),
            }
            let now = Instant::now();
            if now >= deadline {
                break Err(AdapterError::new(AdapterErrorKind::WaitTimeout).with_hint(format!(
                    "url containing {fragment:?} after {}ms",
                    limit.as_millis()
                )));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        };
        self.trace.record("wait url", fragment, &outcome);
        outcome
    }

    async fn click(&self, selector: &str, limit: Duration) -> Result<(), AdapterError> {
        let outcome = bounded(limit, AdapterErrorKind::WaitTimeout, selector, async {
            let element = self.page.find_element(selector).await?;
            element.click().await.map(|_| ())
        })
        .await;
        self.trace.record("click", selector, &outcome);
        outcome
    }

    async fn fill(&self, selector: &str, value: &str, limit: Duration) -> Result<(), AdapterError> {
        let outcome = bounded(limit, AdapterErrorKind::WaitTimeout, selector, async {
            let element = self.page.find_element(selector).await?;
            element.click().await?;
            element.call_js_fn(scripts::CLEAR_VALUE_FN, false).await?;
            element.type_str(value).await.map(|_| ())
        })
        .await;
        self.trace.record("fill", selector, &outcome);
        outcome
    }

    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, AdapterError> {
        let outcome = self
            .evaluate(&scripts::inner_texts_script(selector))
            .await
            .and_then(|value| {
                serde_json::from_value::<Vec<String>>(value).map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint(format!("unexpected innerText result: {err}"))
                })
            });
        self.trace.record("inner texts", selector, &outcome);
        outcome
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let outcome = self.page.screenshot(params).await.map_err(AdapterError::cdp);
        self.trace.record("screenshot", "full page", &outcome);
        outcome
    }

    async fn content(&self) -> Result<String, AdapterError> {
        self.page.content().await.map_err(AdapterError::cdp)
    }

    async fn start_trace(&self) -> Result<(), AdapterError> {
        self.trace.start();
        Ok(())
    }

    async fn stop_trace(&self, path: &Path) -> Result<(), AdapterError> {
        self.trace.finish(path).await.map(|_| ())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map(|_| ()).map_err(AdapterError::cdp);
        if let Err(err) = browser.wait().await {
            debug!(target: "cdp-adapter", ?err, "waiting for chromium exit failed");
        }
        self.handler.abort();
        closed
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
