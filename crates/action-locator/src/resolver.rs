//! Element resolver with fallback chain orchestration

use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{AdapterErrorKind, BrowserSession, ElementState};
use site_profile::SiteProfile;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::LocatorError;
use crate::strategies::build_candidates;
use crate::types::{LocateRequest, ResolvedLocator};

/// Upper bound on a single candidate probe.
pub const PROBE_TIMEOUT_CAP: Duration = Duration::from_millis(2_000);

#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve `request.target` on the current page, refreshing `profile`
    /// when an explicit or learned selector wins.
    async fn resolve(
        &self,
        session: &dyn BrowserSession,
        request: &LocateRequest<'_>,
        profile: &mut SiteProfile,
    ) -> Result<ResolvedLocator, LocatorError>;
}

#[derive(Debug, Clone)]
pub struct DefaultElementResolver {
    probe_cap: Duration,
}

impl Default for DefaultElementResolver {
    fn default() -> Self {
        Self {
            probe_cap: PROBE_TIMEOUT_CAP,
        }
    }
}

impl DefaultElementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe_cap(mut self, cap: Duration) -> Self {
        self.probe_cap = cap;
        self
    }
}

#[async_trait]
impl ElementResolver for DefaultElementResolver {
    async fn resolve(
        &self,
        session: &dyn BrowserSession,
        request: &LocateRequest<'_>,
        profile: &mut SiteProfile,
    ) -> Result<ResolvedLocator, LocatorError> {
        let target = request.target.trim();
        if target.is_empty() {
            return Err(LocatorError::InvalidTarget(
                "target label is empty".to_string(),
            ));
        }

        let candidates = build_candidates(target, request.selector, profile);
        let deadline = Instant::now() + request.timeout;
        info!(label = target, candidates = candidates.len(), "resolving element");

        let mut attempted = 0;
        for candidate in candidates {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(label = target, "step timeout exhausted before all candidates were probed");
                break;
            }
            attempted += 1;
            let probe = remaining.min(self.probe_cap);
            debug!(strategy = candidate.strategy.name(), query = %candidate.query, "probing candidate");

            match session
                .wait_for(&candidate.query, ElementState::Attached, probe)
                .await
            {
                Ok(selector) => {
                    if candidate.strategy.refreshes_profile() {
                        if let Some(css) = candidate.query.as_css() {
                            profile.remember(target, css);
                        }
                    }
                    info!(
                        label = target,
                        strategy = candidate.strategy.name(),
                        attempts = attempted,
                        "resolved element"
                    );
                    return Ok(ResolvedLocator {
                        selector,
                        candidate,
                        attempts: attempted,
                    });
                }
                Err(err)
                    if matches!(
                        err.kind,
                        AdapterErrorKind::Launch | AdapterErrorKind::Internal
                    ) =>
                {
                    return Err(LocatorError::Browser {
                        target: target.to_string(),
                        source: err,
                    });
                }
                Err(err) => {
                    debug!(strategy = candidate.strategy.name(), %err, "candidate did not attach");
                }
            }
        }

        warn!(label = target, attempted, "no locator strategy matched");
        Err(LocatorError::NotFound {
            target: target.to_string(),
            attempted,
        })
    }
}
