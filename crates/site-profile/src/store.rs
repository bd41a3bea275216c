use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::ProfileError;
use crate::profile::SiteProfile;

#[async_trait]
pub trait SiteProfileStore: Send + Sync {
    /// Profile for `domain`; never fails, absent or unreadable profiles are empty.
    async fn load(&self, domain: &str) -> SiteProfile;

    async fn save(&self, profile: &SiteProfile) -> Result<(), ProfileError>;
}

/// One `<domain>.json` document per domain under `root`.
#[derive(Debug, Clone)]
pub struct FsSiteProfileStore {
    root: PathBuf,
}

impl FsSiteProfileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn profile_path(&self, domain: &str) -> PathBuf {
        self.root.join(format!("{}.json", domain))
    }
}

#[async_trait]
impl SiteProfileStore for FsSiteProfileStore {
    async fn load(&self, domain: &str) -> SiteProfile {
        let path = self.profile_path(domain);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(domain, "no site profile yet");
                return SiteProfile::empty(domain);
            }
            Err(err) => {
                warn!(?err, path = %path.display(), "failed to read site profile; starting empty");
                return SiteProfile::empty(domain);
            }
        };
        match serde_json::from_slice::<SiteProfile>(&bytes) {
            Ok(mut profile) => {
                profile.domain = domain.to_string();
                profile
            }
            Err(err) => {
                warn!(?err, path = %path.display(), "corrupt site profile; starting empty");
                SiteProfile::empty(domain)
            }
        }
    }

    async fn save(&self, profile: &SiteProfile) -> Result<(), ProfileError> {
        let path = self.profile_path(&profile.domain);
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ProfileError::Write {
                path: self.root.clone(),
                source,
            })?;
        let payload = serde_json::to_vec_pretty(profile).map_err(|source| ProfileError::Encode {
            domain: profile.domain.clone(),
            source,
        })?;
        fs::write(&path, payload)
            .await
            .map_err(|source| ProfileError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(
            domain = %profile.domain,
            selectors = profile.selectors.len(),
            path = %path.display(),
            "saved site profile"
        );
        Ok(())
    }
}

/// Process-local profiles, used by tests and by the HTTP server when no
/// artifacts root is configured.
#[derive(Debug, Default)]
pub struct InMemorySiteProfileStore {
    profiles: RwLock<HashMap<String, SiteProfile>>,
}

impl InMemorySiteProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: SiteProfile) {
        self.profiles.write().insert(profile.domain.clone(), profile);
    }

    pub fn get(&self, domain: &str) -> Option<SiteProfile> {
        self.profiles.read().get(domain).cloned()
    }
}

#[async_trait]
impl SiteProfileStore for InMemorySiteProfileStore {
    async fn load(&self, domain: &str) -> SiteProfile {
        self.get(domain)
            .unwrap_or_else(|| SiteProfile::empty(domain))
    }

    async fn save(&self, profile: &SiteProfile) -> Result<(), ProfileError> {
        self.insert(profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_profile_is_empty_at_epoch() {
        let dir = tempdir().unwrap();
        let store = FsSiteProfileStore::new(dir.path().join("site-profiles"));
        let profile = store.load("example.com").await;
        assert_eq!(profile, SiteProfile::empty("example.com"));
    }

    #[tokio::test]
    async fn corrupt_profile_is_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("example.com.json"), b"{ nope").unwrap();
        let store = FsSiteProfileStore::new(dir.path());
        let profile = store.load("example.com").await;
        assert!(profile.selectors.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_selectors() {
        let dir = tempdir().unwrap();
        let store = FsSiteProfileStore::new(dir.path().join("nested").join("profiles"));

        let mut profile = SiteProfile::empty("example.com");
        profile.remember("Submit", "#submit");
        profile.touch();
        store.save(&profile).await.unwrap();

        let loaded = store.load("example.com").await;
        assert_eq!(loaded.selector_for("Submit"), Some("#submit"));
        assert_eq!(loaded.updated_at, profile.updated_at);
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemorySiteProfileStore::new();
        let mut profile = store.load("default").await;
        profile.remember("Email", "input[name=email]");
        store.save(&profile).await.unwrap();
        assert_eq!(
            store.load("default").await.selector_for("Email"),
            Some("input[name=email]")
        );
    }
}
