//! Core types for locator system

use std::time::Duration;

use cdp_adapter::ElementQuery;
use serde::{Deserialize, Serialize};

/// Strategy a candidate originates from, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorStrategy {
    Explicit,
    Profile,
    RoleButton,
    RoleLink,
    Label,
    Placeholder,
    ExactText,
    FuzzyText,
    NameAttribute,
    AriaLabelAttribute,
}

impl LocatorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Explicit => "explicit",
            LocatorStrategy::Profile => "profile",
            LocatorStrategy::RoleButton => "role-button",
            LocatorStrategy::RoleLink => "role-link",
            LocatorStrategy::Label => "label",
            LocatorStrategy::Placeholder => "placeholder",
            LocatorStrategy::ExactText => "text",
            LocatorStrategy::FuzzyText => "text-fuzzy",
            LocatorStrategy::NameAttribute => "name-attribute",
            LocatorStrategy::AriaLabelAttribute => "aria-label-attribute",
        }
    }

    /// Heuristics tried after the explicit and learned selectors.
    pub fn heuristic_chain() -> [LocatorStrategy; 8] {
        [
            LocatorStrategy::RoleButton,
            LocatorStrategy::RoleLink,
            LocatorStrategy::Label,
            LocatorStrategy::Placeholder,
            LocatorStrategy::ExactText,
            LocatorStrategy::FuzzyText,
            LocatorStrategy::NameAttribute,
            LocatorStrategy::AriaLabelAttribute,
        ]
    }

    /// Wins from these strategies refresh the site profile.
    pub fn refreshes_profile(&self) -> bool {
        matches!(self, LocatorStrategy::Explicit | LocatorStrategy::Profile)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub strategy: LocatorStrategy,
    pub query: ElementQuery,
}

impl Candidate {
    pub fn new(strategy: LocatorStrategy, query: ElementQuery) -> Self {
        Self { strategy, query }
    }

    /// `strategy:query` label used in logs.
    pub fn describe(&self) -> String {
        format!("{}:{}", self.strategy.name(), self.query)
    }
}

#[derive(Debug, Clone)]
pub struct LocateRequest<'a> {
    pub target: &'a str,
    pub selector: Option<&'a str>,
    pub timeout: Duration,
}

impl<'a> LocateRequest<'a> {
    pub fn new(target: &'a str, selector: Option<&'a str>, timeout: Duration) -> Self {
        Self {
            target,
            selector,
            timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocator {
    /// Selector pinned to the matched element for the follow-up action.
    pub selector: String,
    pub candidate: Candidate,
    pub attempts: usize,
}

impl ResolvedLocator {
    pub fn strategy(&self) -> LocatorStrategy {
        self.candidate.strategy
    }
}
