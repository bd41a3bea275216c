//! Candidate chain construction

use cdp_adapter::ElementQuery;
use serde_json::Value;
use site_profile::SiteProfile;

use crate::types::{Candidate, LocatorStrategy};

/// Ordered candidates for `target`: explicit selector, learned selector, then
/// the fixed heuristics.
pub fn build_candidates(target: &str, selector: Option<&str>, profile: &SiteProfile) -> Vec<Candidate> {
    let label = target.trim();
    let mut candidates = Vec::with_capacity(10);

    if let Some(selector) = selector.map(str::trim).filter(|s| !s.is_empty()) {
        candidates.push(Candidate::new(
            LocatorStrategy::Explicit,
            ElementQuery::css(selector),
        ));
    }
    if let Some(remembered) = profile.selector_for(label) {
        candidates.push(Candidate::new(
            LocatorStrategy::Profile,
            ElementQuery::css(remembered),
        ));
    }

    for strategy in LocatorStrategy::heuristic_chain() {
        candidates.push(Candidate::new(strategy, heuristic_query(strategy, label)));
    }
    candidates
}

fn heuristic_query(strategy: LocatorStrategy, label: &str) -> ElementQuery {
    match strategy {
        LocatorStrategy::RoleButton => ElementQuery::role("button", label),
        LocatorStrategy::RoleLink => ElementQuery::role("link", label),
        LocatorStrategy::Label => ElementQuery::Label {
            text: label.to_string(),
        },
        LocatorStrategy::Placeholder => ElementQuery::Placeholder {
            text: label.to_string(),
        },
        LocatorStrategy::ExactText => ElementQuery::text(label, true),
        LocatorStrategy::FuzzyText => ElementQuery::text(label, false),
        LocatorStrategy::NameAttribute => ElementQuery::css(attribute_selector("name", label)),
        LocatorStrategy::AriaLabelAttribute => {
            ElementQuery::css(attribute_selector("aria-label", label))
        }
        // Only reachable through `build_candidates`' explicit and learned branches.
        LocatorStrategy::Explicit | LocatorStrategy::Profile => ElementQuery::css(label),
    }
}

/// `[attr="value"]` with the value quoted as a JSON string.
fn attribute_selector(attr: &str, value: &str) -> String {
    format!("[{attr}={}]", Value::String(value.to_string()))
}
