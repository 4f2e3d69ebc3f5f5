// ─── Version Catalog ───
// Parses the published list of installable builds. Each entry is a
// `[semVersion, uuid, channel]` triple.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::model::{Channel, SemVersion, Version};
use crate::core::error::{LauncherError, LauncherResult};

pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/AmethystAPI/Launcher-Data/main/versions.json.min";

#[derive(Debug, Deserialize)]
struct CatalogEntry(SemVersion, Uuid, Channel);

/// Every build the catalog knows about, in publication order.
#[derive(Debug, Clone, Default)]
pub struct VersionCatalog {
    versions: Vec<Version>,
}

impl VersionCatalog {
    /// Fetch the catalog using a shared HTTP client. No caching happens here.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> LauncherResult<Self> {
        info!("Fetching version catalog from {}", url);

        let body = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let catalog = Self::from_json(&body)?;

        info!("Loaded {} versions from catalog", catalog.versions.len());
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> LauncherResult<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(raw)?;
        let versions = entries
            .into_iter()
            .map(|CatalogEntry(sem_version, uuid, channel)| {
                Version::new(sem_version, uuid, channel)
            })
            .collect();
        Ok(Self { versions })
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Find a build by semantic version (e.g. "1.21.0.3").
    pub fn find(&self, sem_version: &SemVersion) -> Option<&Version> {
        self.versions.iter().find(|v| &v.sem_version == sem_version)
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<&Version> {
        self.versions.iter().find(|v| &v.uuid == uuid)
    }

    /// Parse `raw` and look it up, for callers holding a version string from a profile.
    pub fn resolve(&self, raw: &str) -> LauncherResult<&Version> {
        let sem_version: SemVersion = raw.parse()?;
        self.find(&sem_version)
            .ok_or_else(|| LauncherError::VersionNotFound(raw.to_string()))
    }

    /// All builds published on `channel`.
    pub fn on_channel(&self, channel: Channel) -> Vec<&Version> {
        self.versions
            .iter()
            .filter(|v| v.channel == channel)
            .collect()
    }
}
