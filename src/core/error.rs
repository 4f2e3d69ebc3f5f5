use std::path::PathBuf;
use thiserror::Error;

/// Failures while streaming an archive from the remote source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid archive source: {0}")]
    Source(String),
}

/// Failures while expanding an archive into an install directory.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Extraction incomplete: {processed}/{total} entries processed")]
    Incomplete { processed: usize, total: usize },

    #[error("Failed to inject proxy artifact {source_path:?}: {source}")]
    Proxy {
        source_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Extraction task aborted: {0}")]
    Aborted(String),
}

/// Failures of the OS package registry primitives or of the polling around them.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{action} failed: {message}")]
    Command { action: String, message: String },

    #[error("Package registry query failed: {0}")]
    Query(String),

    #[error("Package {package_id} is still registered")]
    StillRegistered { package_id: String },

    #[error("Package registry did not settle after {attempts} checks")]
    Timeout { attempts: u32 },

    #[error("Package manifest not found at {0:?}")]
    ManifestMissing(PathBuf),

    #[error("Package manifest {path:?} is unreadable: {message}")]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("Package manifest declares {found}, expected {expected}")]
    ForeignManifest { expected: String, found: String },

    #[error("Windows developer mode is disabled; enable it to register unpacked packages")]
    DeveloperModeDisabled,
}

/// Lifecycle step a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Recover,
    Download,
    Extract,
    Register,
    Delete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Recover => write!(f, "recover"),
            Stage::Download => write!(f, "download"),
            Stage::Extract => write!(f, "extract"),
            Stage::Register => write!(f, "register"),
            Stage::Delete => write!(f, "delete"),
        }
    }
}

/// Central error type for the switcher core.
/// Every module returns `Result<T, LauncherError>` or one of the component errors above.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── Lifecycle stages ────────────────────────────────
    #[error("Failed to download {version}: {source}")]
    Network {
        version: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to extract {version}: {source}")]
    Extraction {
        version: String,
        #[source]
        source: ExtractionError,
    },

    #[error("Failed to register {version}: {source}")]
    Registration {
        version: String,
        #[source]
        source: RegistrationError,
    },

    #[error("Could not clean up the interrupted install of {version} at {path:?}: {source}")]
    LockRecovery {
        version: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Another install operation is already running")]
    Busy,

    #[error("Not enough disk space at {path:?}: available={available} required={required}")]
    InsufficientSpace {
        path: PathBuf,
        available: u64,
        required: u64,
    },

    #[error("Version {0} is the active package and cannot be removed")]
    VersionActive(String),

    // ── Versions ────────────────────────────────────────
    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("Version not found in catalog: {0}")]
    VersionNotFound(String),

    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// Lifecycle stage the failure happened in, when it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            LauncherError::Network { .. } | LauncherError::InsufficientSpace { .. } => {
                Some(Stage::Download)
            }
            LauncherError::Extraction { .. } => Some(Stage::Extract),
            LauncherError::Registration { .. } => Some(Stage::Register),
            LauncherError::LockRecovery { .. } => Some(Stage::Recover),
            LauncherError::VersionActive(_) => Some(Stage::Delete),
            _ => None,
        }
    }

    /// Network and extraction failures leave no partial state behind, so the
    /// caller can retry straight away. Registration needs user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LauncherError::Network { .. } | LauncherError::Extraction { .. }
        )
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for IPC callers ───────────────────────
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
