//! Site profiles
//!
//! A profile remembers, per domain, the CSS selector that last located each
//! labelled element. Profiles are advisory: a missing or unreadable profile is
//! simply an empty one.

mod domain;
mod errors;
mod profile;
mod store;

pub use domain::{domain_key, DEFAULT_DOMAIN};
pub use errors::ProfileError;
pub use profile::SiteProfile;
pub use store::{FsSiteProfileStore, InMemorySiteProfileStore, SiteProfileStore};
