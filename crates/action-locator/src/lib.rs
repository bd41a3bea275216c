//! Locator resolution
//!
//! Turns a human label ("Sign in", "Email") into an actionable element by
//! probing an ordered candidate chain:
//! - an explicit CSS selector from the plan
//! - the selector previously learned for the label on this domain
//! - fixed role, label, placeholder, text and attribute heuristics
//!
//! The first candidate that attaches wins. Explicit and learned wins are
//! written back into the site profile.

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::LocatorError;
pub use resolver::{DefaultElementResolver, ElementResolver, PROBE_TIMEOUT_CAP};
pub use strategies::build_candidates;
pub use types::{Candidate, LocateRequest, LocatorStrategy, ResolvedLocator};
