//! Browser capability for testair.
//!
//! The rest of the workspace only talks to [`BrowserSession`] and
//! [`BrowserLauncher`]. [`ChromiumLauncher`] drives a real Chromium over the
//! DevTools protocol; [`InMemorySite`] is a scripted double for tests.

pub mod chromium;
pub mod config;
pub mod error;
pub mod memory;
pub mod query;
mod scripts;
pub mod session;
pub mod trace;

pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use config::{detect_chrome_executable, LaunchOptions};
pub use error::{AdapterError, AdapterErrorKind};
pub use memory::{FakeAction, FakeElement, FakePage, InMemorySession, InMemorySite};
pub use query::{ElementQuery, ElementState};
pub use scripts::ANCHOR_ATTR;
pub use session::{BrowserLauncher, BrowserSession};
pub use trace::{TraceEvent, TraceRecorder};
