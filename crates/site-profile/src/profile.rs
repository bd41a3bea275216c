use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteProfile {
    pub domain: String,
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl SiteProfile {
    /// Empty profile stamped at the Unix epoch.
    pub fn empty(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            selectors: BTreeMap::new(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Learned selector for a trimmed target label. Empty entries count as absent.
    pub fn selector_for(&self, target: &str) -> Option<&str> {
        self.selectors
            .get(target.trim())
            .map(String::as_str)
            .filter(|selector| !selector.is_empty())
    }

    pub fn remember(&mut self, target: &str, selector: impl Into<String>) {
        self.selectors.insert(target.trim().to_string(), selector.into());
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
