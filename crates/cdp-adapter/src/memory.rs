//! In-memory browser double.
//!
//! An [`InMemorySite`] holds scripted pages made of [`FakeElement`]s. Sessions
//! launched from it answer queries with the same matching rules as the
//! Chromium page script, which lets runs be exercised without a browser.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::time::{sleep, Instant};

use crate::config::LaunchOptions;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::query::{ElementQuery, ElementState};
use crate::session::{BrowserLauncher, BrowserSession};
use crate::trace::TraceRecorder;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FakeElement {
    pub tag: String,
    pub role: Option<String>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    /// CSS selectors this element answers to.
    pub selectors: Vec<String>,
    pub visible: bool,
    /// URL loaded when the element is clicked.
    pub navigates_to: Option<String>,
}

impl FakeElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn button(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new("button").with_role("button").with_name(name.clone()).with_text(name)
    }

    pub fn link(name: impl Into<String>, href: impl Into<String>) -> Self {
        let name = name.into();
        Self::new("a")
            .with_role("link")
            .with_name(name.clone())
            .with_text(name)
            .navigating_to(href)
    }

    pub fn input(label: impl Into<String>) -> Self {
        Self::new("input").with_role("textbox").with_label(label)
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        self.selectors.push(format!("[{name}=\"{value}\"]"));
        self.attributes.insert(name, value);
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn navigating_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn matches(&self, query: &ElementQuery) -> bool {
        match query {
            ElementQuery::Css { selector } => self.selectors.iter().any(|s| s == selector),
            ElementQuery::Role { role, name } => {
                self.role.as_deref() == Some(role.as_str())
                    && contains(self.name.as_deref().unwrap_or(&self.text), name)
            }
            ElementQuery::Label { text } => self
                .label
                .as_deref()
                .is_some_and(|label| contains(label, text)),
            ElementQuery::Placeholder { text } => self
                .placeholder
                .as_deref()
                .is_some_and(|placeholder| contains(placeholder, text)),
            ElementQuery::Text { content, exact } => {
                let own = normalize(&self.text);
                if own.is_empty() {
                    false
                } else if *exact {
                    own == normalize(content)
                } else {
                    contains(&own, content)
                }
            }
        }
    }

    fn render(&self) -> String {
        let mut attrs = String::new();
        for (name, value) in &self.attributes {
            attrs.push_str(&format!(" {name}=\"{value}\""));
        }
        if let Some(placeholder) = &self.placeholder {
            attrs.push_str(&format!(" placeholder=\"{placeholder}\""));
        }
        format!("<{tag}{attrs}>{text}</{tag}>", tag = self.tag, text = self.text)
    }
}

fn normalize(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains(haystack: &str, needle: &str) -> bool {
    normalize(haystack)
        .to_lowercase()
        .contains(&normalize(needle).to_lowercase())
}

#[derive(Clone, Debug, Default)]
pub struct FakePage {
    pub title: String,
    pub elements: Vec<FakeElement>,
}

impl FakePage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    fn html(&self) -> String {
        let body: String = self.elements.iter().map(FakeElement::render).collect();
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            self.title, body
        )
    }
}

/// Recorded interaction against an in-memory session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeAction {
    Goto(String),
    Click(String),
    Fill { selector: String, value: String },
}

#[derive(Debug, Default)]
struct SiteState {
    pages: RwLock<HashMap<String, FakePage>>,
    actions: Mutex<Vec<FakeAction>>,
    launches: Mutex<usize>,
    open_sessions: Mutex<usize>,
}

/// Shared scripted website; also the [`BrowserLauncher`] for in-memory sessions.
#[derive(Clone, Debug, Default)]
pub struct InMemorySite {
    state: Arc<SiteState>,
}

impl InMemorySite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, page: FakePage) -> Self {
        self.put_page(url, page);
        self
    }

    pub fn put_page(&self, url: impl Into<String>, page: FakePage) {
        self.state.pages.write().insert(page_key(&url.into()), page);
    }

    pub fn actions(&self) -> Vec<FakeAction> {
        self.state.actions.lock().clone()
    }

    pub fn launches(&self) -> usize {
        *self.state.launches.lock()
    }

    pub fn open_sessions(&self) -> usize {
        *self.state.open_sessions.lock()
    }

    fn page(&self, url: &str) -> Option<FakePage> {
        self.state.pages.read().get(&page_key(url)).cloned()
    }

    fn log(&self, action: FakeAction) {
        self.state.actions.lock().push(action);
    }
}

fn page_key(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait]
impl BrowserLauncher for InMemorySite {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError> {
        *self.state.launches.lock() += 1;
        *self.state.open_sessions.lock() += 1;
        Ok(Box::new(InMemorySession {
            site: self.clone(),
            current: Mutex::new(None),
            pinned: Mutex::new(HashMap::new()),
            trace: TraceRecorder::new(),
            closed: Mutex::new(false),
        }))
    }
}

pub struct InMemorySession {
    site: InMemorySite,
    current: Mutex<Option<String>>,
    /// Anchor selectors handed out by `wait_for`, mapped to the element index.
    pinned: Mutex<HashMap<String, usize>>,
    trace: TraceRecorder,
    closed: Mutex<bool>,
}

impl InMemorySession {
    fn current_page(&self) -> Result<(String, FakePage), AdapterError> {
        let url = self.current.lock().clone().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Internal).with_hint("no page loaded")
        })?;
        let page = self.site.page(&url).ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!("page {url} vanished"))
        })?;
        Ok((url, page))
    }

    fn find(&self, query: &ElementQuery, state: ElementState) -> Option<usize> {
        let (_, page) = self.current_page().ok()?;
        page.elements.iter().position(|element| {
            element.matches(query) && (state == ElementState::Attached || element.visible)
        })
    }

    fn element_for(&self, selector: &str) -> Result<FakeElement, AdapterError> {
        let (_, page) = self.current_page()?;
        let pinned = self.pinned.lock().get(selector).copied();
        let element = match pinned {
            Some(index) => page.elements.get(index).cloned(),
            None => page
                .elements
                .iter()
                .find(|element| element.matches(&ElementQuery::css(selector)))
                .cloned(),
        };
        element.ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(selector.to_string())
        })
    }

    fn load(&self, url: &str) -> Result<(), AdapterError> {
        if self.site.page(url).is_none() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("net::ERR_NAME_NOT_RESOLVED at {url}")));
        }
        *self.current.lock() = Some(url.to_string());
        self.pinned.lock().clear();
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for InMemorySession {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), AdapterError> {
        self.site.log(FakeAction::Goto(url.to_string()));
        let outcome = self.load(url);
        self.trace.record("goto", url, &outcome);
        outcome
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        Ok(self.current.lock().clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn wait_for(
        &self,
        query: &ElementQuery,
        state: ElementState,
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        let deadline = Instant::now() + timeout;
        let outcome = loop {
            if let Some(index) = self.find(query, state) {
                let selector = format!("[data-testair-anchor=\"mem-{index}\"]");
                self.pinned.lock().insert(selector.clone(), index);
                break Ok(selector);
            }
            let now = Instant::now();
            if now >= deadline {
                break Err(AdapterError::new(AdapterErrorKind::WaitTimeout).with_hint(format!(
                    "{query} not {} after {}ms",
                    state.as_str(),
                    timeout.as_millis()
                )));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        };
        self.trace
            .record(&format!("wait {}", state.as_str()), &query.to_string(), &outcome);
        outcome
    }

    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout;
        let outcome = loop {
            if self.current_url().await?.contains(fragment) {
                break Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                break Err(AdapterError::new(AdapterErrorKind::WaitTimeout).with_hint(format!(
                    "url containing {fragment:?} after {}ms",
                    timeout.as_millis()
                )));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        };
        self.trace.record("wait url", fragment, &outcome);
        outcome
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<(), AdapterError> {
        let outcome = self.element_for(selector).and_then(|element| {
            self.site.log(FakeAction::Click(selector.to_string()));
            match element.navigates_to {
                Some(url) => self.load(&url),
                None => Ok(()),
            }
        });
        self.trace.record("click", selector, &outcome);
        outcome
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> Result<(), AdapterError> {
        let outcome = self.element_for(selector).map(|_| {
            self.site.log(FakeAction::Fill {
                selector: selector.to_string(),
                value: value.to_string(),
            });
        });
        self.trace.record("fill", selector, &outcome);
        outcome
    }

    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, AdapterError> {
        let (_, page) = self.current_page()?;
        let query = ElementQuery::css(selector);
        Ok(page
            .elements
            .iter()
            .filter(|element| element.matches(&query))
            .map(|element| element.text.clone())
            .collect())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        let url = self.current_url().await?;
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(url.as_bytes());
        Ok(bytes)
    }

    async fn content(&self) -> Result<String, AdapterError> {
        match self.current_page() {
            Ok((_, page)) => Ok(page.html()),
            Err(_) => Ok("<html><head></head><body></body></html>".to_string()),
        }
    }

    async fn start_trace(&self) -> Result<(), AdapterError> {
        self.trace.start();
        Ok(())
    }

    async fn stop_trace(&self, path: &Path) -> Result<(), AdapterError> {
        self.trace.finish(path).await.map(|_| ())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        let mut closed = self.closed.lock();
        if !*closed {
            *closed = true;
            *self.site.state.open_sessions.lock() -= 1;
        }
        Ok(())
    }
}
