//! Secret placeholders for test plans
//!
//! Plans never carry credentials directly. Fill values reference secrets through
//! `${SECRET:NAME}` placeholders which are bound from a [`SecretStore`] only at the
//! moment a value is typed into the page, and redacted whenever a plan is written out.

pub mod errors;
pub mod placeholder;
pub mod store;

pub use errors::SecretError;
pub use placeholder::{contains_placeholder, placeholder_names, redact_placeholders, resolve_placeholders};
pub use store::{parse_env_file, EnvFileSecrets, ProcessEnvSecrets, SecretStore, StaticSecrets};
