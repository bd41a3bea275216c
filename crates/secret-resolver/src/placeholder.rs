use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use crate::{errors::SecretError, store::SecretStore};

static SECRET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{SECRET:([A-Z0-9_]+)\}").expect("secret placeholder pattern"));

const REDACTED: &str = "${SECRET:***}";

/// Replace every placeholder in `value` with the secret held by `store`.
///
/// A missing or empty entry is an error; no default is ever substituted.
pub fn resolve_placeholders(value: &str, store: &dyn SecretStore) -> Result<String, SecretError> {
    let mut resolved = String::with_capacity(value.len());
    let mut last = 0;
    for captures in SECRET_PATTERN.captures_iter(value) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let secret = store
            .lookup(name.as_str())
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| SecretError::Missing(name.as_str().to_string()))?;
        resolved.push_str(&value[last..whole.start()]);
        resolved.push_str(&secret);
        last = whole.end();
    }
    resolved.push_str(&value[last..]);
    Ok(resolved)
}

/// Mask placeholder names so persisted copies do not reveal which secrets a plan uses.
pub fn redact_placeholders(value: &str) -> String {
    SECRET_PATTERN
        .replace_all(value, NoExpand(REDACTED))
        .into_owned()
}

pub fn contains_placeholder(value: &str) -> bool {
    SECRET_PATTERN.is_match(value)
}

/// Names referenced by `value`, in order of appearance.
pub fn placeholder_names(value: &str) -> Vec<String> {
    SECRET_PATTERN
        .captures_iter(value)
        .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
