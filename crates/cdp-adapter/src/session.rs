use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::LaunchOptions;
use crate::error::AdapterError;
use crate::query::{ElementQuery, ElementState};

/// One isolated browser context with a single page.
///
/// Every wait is bounded by the supplied timeout and reports
/// [`AdapterErrorKind::WaitTimeout`](crate::AdapterErrorKind::WaitTimeout) on expiry.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AdapterError>;

    async fn current_url(&self) -> Result<String, AdapterError>;

    /// Wait until `query` matches an element in `state`, returning a CSS
    /// selector pinned to that element.
    async fn wait_for(
        &self,
        query: &ElementQuery,
        state: ElementState,
        timeout: Duration,
    ) -> Result<String, AdapterError>;

    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), AdapterError>;

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), AdapterError>;

    /// Replace the value of an input. The value is never logged or traced.
    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<(), AdapterError>;

    /// Raw `innerText` of every element matching a CSS selector, in document order.
    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>, AdapterError>;

    /// Full-page PNG.
    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, AdapterError>;

    async fn start_trace(&self) -> Result<(), AdapterError>;

    /// Flush the recorded trace into a zip archive at `path`.
    async fn stop_trace(&self, path: &Path) -> Result<(), AdapterError>;

    async fn close(&self) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError>;
}
