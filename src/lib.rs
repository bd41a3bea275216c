//! testair
//!
//! Command line tool and HTTP wrapper around the plan runner: generate plans,
//! run them against Chromium, replay stored results and repair failing plans.

pub mod cli;
pub mod config;
pub mod repair;
pub mod server;

pub use config::TestairConfig;
pub use repair::{RepairLoop, RepairOutcome};
