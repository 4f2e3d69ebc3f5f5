// ─── Package Registration ───
// `PackageRegistry` is the raw OS surface (query / remove / register).
// `PackageRegistrar` layers the polling and manifest checks on top so
// every caller sees the registry in a settled state.

pub mod appx;
pub mod manifest;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::error::RegistrationError;
use crate::core::layout::same_path;

pub use appx::AppxRegistry;
pub use manifest::{PackageIdentity, MANIFEST_FILE};

/// Package family managed by the switcher.
pub const DEFAULT_PACKAGE_NAME: &str = "Microsoft.MinecraftUWP";

/// The package currently registered for the managed family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPackage {
    /// Full package id, e.g. `Microsoft.MinecraftUWP_1.21.2.2_x64__8wekyb3d8bbwe`.
    pub id: String,
    /// Folder the package is registered from.
    pub root: PathBuf,
}

#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn query(&self) -> Result<Option<RegisteredPackage>, RegistrationError>;

    /// Removes the registration but keeps the user's roaming data.
    async fn remove(&self, package_id: &str) -> Result<(), RegistrationError>;

    /// Registers the loose-file package described by `manifest`.
    async fn register_manifest(&self, manifest: &Path) -> Result<(), RegistrationError>;

    async fn developer_mode_enabled(&self) -> Result<bool, RegistrationError> {
        Ok(true)
    }

    /// Returns whether the request went through; callers re-check.
    async fn enable_developer_mode(&self) -> Result<bool, RegistrationError> {
        Ok(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_millis(500),
        }
    }
}

pub struct PackageRegistrar {
    registry: Arc<dyn PackageRegistry>,
    package_name: String,
    poll: PollSettings,
}

impl PackageRegistrar {
    pub fn new(registry: Arc<dyn PackageRegistry>, package_name: impl Into<String>) -> Self {
        Self {
            registry,
            package_name: package_name.into(),
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = package_name.into();
        self
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub async fn registered(&self) -> Result<Option<RegisteredPackage>, RegistrationError> {
        self.registry.query().await
    }

    /// Whether the managed family is registered from `install_dir`.
    pub async fn is_registered_at(&self, install_dir: &Path) -> Result<bool, RegistrationError> {
        Ok(self
            .registered()
            .await?
            .map(|pkg| same_path(&pkg.root, install_dir))
            .unwrap_or(false))
    }

    /// Removes whatever is registered and waits until the registry agrees.
    /// A no-op when nothing is registered.
    pub async fn unregister(&self) -> Result<(), RegistrationError> {
        let Some(current) = self.registered().await? else {
            return Ok(());
        };

        info!("Unregistering {} ({:?})", current.id, current.root);
        self.registry.remove(&current.id).await?;
        self.wait_until(|pkg| pkg.is_none()).await.map(|_| ())
    }

    /// Replaces the current registration with the package unpacked at
    /// `install_dir` and waits until the registry reports it.
    pub async fn register(&self, install_dir: &Path) -> Result<RegisteredPackage, RegistrationError> {
        if self.registered().await?.is_some() {
            match self.unregister().await {
                Ok(()) | Err(RegistrationError::Timeout { .. }) => {}
                Err(err) => return Err(err),
            }
            if let Some(still) = self.registered().await? {
                return Err(RegistrationError::StillRegistered {
                    package_id: still.id,
                });
            }
        }

        let manifest_path = install_dir.join(MANIFEST_FILE);
        let identity = manifest::read_identity(&manifest_path).await?;
        if identity.name != self.package_name {
            return Err(RegistrationError::ForeignManifest {
                expected: self.package_name.clone(),
                found: identity.name,
            });
        }

        info!("Registering {} {} from {:?}", identity.name, identity.version, install_dir);
        self.registry.register_manifest(&manifest_path).await?;

        let attempts = self.poll.attempts;
        self.wait_until(|pkg| pkg.map(|p| same_path(&p.root, install_dir)).unwrap_or(false))
            .await?
            .ok_or(RegistrationError::Timeout { attempts })
    }

    /// Makes sure loose-file registration is allowed, optionally asking the
    /// OS to turn developer mode on.
    pub async fn ensure_developer_mode(&self, request: bool) -> Result<(), RegistrationError> {
        if self.registry.developer_mode_enabled().await? {
            return Ok(());
        }

        if request {
            if self.registry.enable_developer_mode().await? && self.registry.developer_mode_enabled().await? {
                info!("Developer mode enabled");
                return Ok(());
            }
            warn!("Developer mode is still disabled after the enable request");
        }

        Err(RegistrationError::DeveloperModeDisabled)
    }

    async fn wait_until<F>(&self, settled: F) -> Result<Option<RegisteredPackage>, RegistrationError>
    where
        F: Fn(Option<&RegisteredPackage>) -> bool,
    {
        let attempts = self.poll.attempts.max(1);
        for attempt in 1..=attempts {
            let current = self.registry.query().await?;
            if settled(current.as_ref()) {
                return Ok(current);
            }
            debug!("Package registry not settled (attempt {}/{})", attempt, attempts);
            if attempt < attempts {
                tokio::time::sleep(self.poll.interval).await;
            }
        }
        Err(RegistrationError::Timeout { attempts })
    }
}
