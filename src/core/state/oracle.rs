use crate::core::error::RegistrationError;
use crate::core::layout::InstallLayout;
use crate::core::lock::LockStore;
use crate::core::registrar::PackageRegistrar;
use crate::core::version::Version;

/// Read-only view over disk and the OS registry. Nothing is cached: every
/// answer is derived at call time.
pub struct StateOracle<'a> {
    layout: &'a InstallLayout,
    locks: &'a LockStore,
    registrar: &'a PackageRegistrar,
}

impl<'a> StateOracle<'a> {
    pub fn new(layout: &'a InstallLayout, locks: &'a LockStore, registrar: &'a PackageRegistrar) -> Self {
        Self {
            layout,
            locks,
            registrar,
        }
    }

    pub fn is_downloaded(&self, version: &Version) -> bool {
        self.layout.is_downloaded(&version.sem_version)
    }

    pub fn is_locked(&self, version: &Version) -> bool {
        self.locks.is_locked(&version.sem_version)
    }

    /// The managed package is registered from this version's install dir.
    pub async fn is_active(&self, version: &Version) -> Result<bool, RegistrationError> {
        self.registrar
            .is_registered_at(&self.layout.install_dir(&version.sem_version))
            .await
    }
}
