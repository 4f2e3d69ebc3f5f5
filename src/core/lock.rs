use std::path::PathBuf;

use tracing::debug;

use crate::core::layout::InstallLayout;
use crate::core::version::SemVersion;

/// Per-version crash marker. A marker that outlives its process means the
/// install it guarded never finished.
#[derive(Debug, Clone)]
pub struct LockStore {
    layout: InstallLayout,
}

impl LockStore {
    pub fn new(layout: InstallLayout) -> Self {
        Self { layout }
    }

    pub fn lock_path(&self, version: &SemVersion) -> PathBuf {
        self.layout.lock_path(version)
    }

    /// Create (or truncate) the empty marker for `version`.
    pub async fn create_lock(&self, version: &SemVersion) -> std::io::Result<()> {
        let path = self.lock_path(version);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Dropped immediately so the handle is not held open on Windows.
        {
            tokio::fs::File::create(&path).await?;
        }

        debug!("Created install marker {:?}", path);
        Ok(())
    }

    pub fn is_locked(&self, version: &SemVersion) -> bool {
        self.lock_path(version).exists()
    }

    /// Remove the marker. Absent markers are not an error.
    pub async fn remove_lock(&self, version: &SemVersion) -> std::io::Result<()> {
        let path = self.lock_path(version);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed install marker {:?}", path);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
