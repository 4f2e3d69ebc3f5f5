use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::registrar::{PollSettings, DEFAULT_PACKAGE_NAME};
use crate::core::version::DEFAULT_CATALOG_URL;

const APP_DIR_NAME: &str = "BedrockSwitcher";
pub const SETTINGS_FILE: &str = "switcher_settings.json";

/// Persisted switcher settings. Missing fields fall back to their defaults so
/// older settings files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitcherConfig {
    /// Root holding `Minecraft-<version>` folders, archives and markers.
    pub versions_dir: PathBuf,
    pub catalog_url: String,
    /// Archive location with a `{uuid}` placeholder.
    pub archive_url_template: String,
    /// Copied into every install as `dxgi.dll` when set.
    pub proxy_artifact: Option<PathBuf>,
    pub package_name: String,
    pub registration_poll_attempts: u32,
    pub registration_poll_interval_ms: u64,
    pub request_developer_mode: bool,
    pub min_free_space_mb: Option<u64>,
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        let poll = PollSettings::default();
        Self {
            versions_dir: default_data_dir().join("versions"),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            archive_url_template: String::new(),
            proxy_artifact: None,
            package_name: DEFAULT_PACKAGE_NAME.to_string(),
            registration_poll_attempts: poll.attempts,
            registration_poll_interval_ms: poll.interval.as_millis() as u64,
            request_developer_mode: true,
            min_free_space_mb: Some(2048),
        }
    }
}

impl SwitcherConfig {
    /// Reads `switcher_settings.json` from `data_dir`. A missing file yields
    /// the defaults; an unreadable one is logged and replaced by them.
    pub fn load_or_default(data_dir: &Path) -> LauncherResult<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => return Err(LauncherError::Io { path, source }),
        };

        match serde_json::from_str(&raw) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!("Ignoring malformed settings file {:?}: {}", path, err);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        std::fs::create_dir_all(data_dir).map_err(|source| LauncherError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            attempts: self.registration_poll_attempts,
            interval: Duration::from_millis(self.registration_poll_interval_ms),
        }
    }

    pub fn min_free_space_bytes(&self) -> Option<u64> {
        self.min_free_space_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }
}

/// `<platform data dir>/BedrockSwitcher`, or a relative folder when the
/// platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
