use std::path::{Component, Path, PathBuf};

use crate::core::version::SemVersion;

const INSTALL_DIR_PREFIX: &str = "Minecraft-";

/// Deterministic on-disk naming for every managed version under one root.
///
/// ```text
/// <root>/Minecraft-<sem>/       expanded package
/// <root>/Minecraft-<sem>.zip    transient archive
/// <root>/Minecraft-<sem>.lock   install marker
/// ```
#[derive(Debug, Clone)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn install_dir(&self, version: &SemVersion) -> PathBuf {
        self.root.join(install_dir_name(version))
    }

    pub fn archive_path(&self, version: &SemVersion) -> PathBuf {
        self.root.join(format!("{}.zip", install_dir_name(version)))
    }

    pub fn lock_path(&self, version: &SemVersion) -> PathBuf {
        self.root.join(format!("{}.lock", install_dir_name(version)))
    }

    pub fn is_downloaded(&self, version: &SemVersion) -> bool {
        self.install_dir(version).is_dir()
    }
}

pub fn install_dir_name(version: &SemVersion) -> String {
    format!("{INSTALL_DIR_PREFIX}{version}")
}

/// Inverse of [`install_dir_name`]. Returns `None` for foreign folders.
pub fn parse_install_dir_name(name: &str) -> Option<SemVersion> {
    name.strip_prefix(INSTALL_DIR_PREFIX)?.parse().ok()
}

/// Compare two paths the way the OS package registry reports them: trailing
/// separators and `.` components are ignored, and Windows paths compare
/// case-insensitively.
pub fn same_path(left: &Path, right: &Path) -> bool {
    normalize(left) == normalize(right)
}

fn normalize(path: &Path) -> Vec<String> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| {
            let part = c.as_os_str().to_string_lossy();
            if cfg!(windows) {
                part.to_lowercase()
            } else {
                part.into_owned()
            }
        })
        .collect()
}
