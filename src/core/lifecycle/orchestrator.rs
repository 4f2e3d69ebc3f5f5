// ─── Version Switcher ───
// Sequences recovery, download, extraction and registration into a single
// idempotent `ensure_active` call:
//
//   Idle → RecoverIfLocked → EnsureDownloaded → EnsureRegistered → Done
//
// Any step may end in a typed `LauncherError`. On-disk state is always either
// complete, absent, or guarded by an install marker that the next call
// recovers from.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::core::archive::{default_exclusions, ArchiveExtractor, ZipExtractor};
use crate::core::downloader::{ArchiveFetcher, HttpFetcher};
use crate::core::error::{ExtractionError, LauncherError, LauncherResult, RegistrationError};
use crate::core::layout::{parse_install_dir_name, InstallLayout};
use crate::core::lock::LockStore;
use crate::core::progress::{format_megabytes, Progress, StatusSink};
use crate::core::registrar::{
    AppxRegistry, PackageRegistrar, PackageRegistry, PollSettings, DEFAULT_PACKAGE_NAME,
};
use crate::core::state::{StateOracle, SwitcherConfig};
use crate::core::version::{SemVersion, Version};

/// File name the proxy artifact is installed under.
pub const PROXY_ARTIFACT_NAME: &str = "dxgi.dll";

/// Which steps of `ensure_active` actually did work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// An interrupted install was cleaned up first.
    pub recovered: bool,
    pub downloaded: bool,
    pub registered: bool,
}

/// A `Minecraft-<version>` folder found under the versions root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledVersion {
    pub sem_version: SemVersion,
    pub path: PathBuf,
    /// An install marker is present, so the folder is unfinished.
    pub locked: bool,
}

pub struct VersionSwitcher {
    layout: InstallLayout,
    locks: LockStore,
    fetcher: Arc<dyn ArchiveFetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
    registrar: PackageRegistrar,
    exclusions: Vec<String>,
    proxy_artifact: Option<PathBuf>,
    min_free_space: Option<u64>,
    request_developer_mode: bool,
    busy: Mutex<()>,
}

impl VersionSwitcher {
    pub fn new(
        versions_root: impl Into<PathBuf>,
        fetcher: Arc<dyn ArchiveFetcher>,
        extractor: Arc<dyn ArchiveExtractor>,
        registry: Arc<dyn PackageRegistry>,
    ) -> Self {
        let layout = InstallLayout::new(versions_root);
        Self {
            locks: LockStore::new(layout.clone()),
            layout,
            fetcher,
            extractor,
            registrar: PackageRegistrar::new(registry, DEFAULT_PACKAGE_NAME),
            exclusions: default_exclusions(),
            proxy_artifact: None,
            min_free_space: None,
            request_developer_mode: false,
            busy: Mutex::new(()),
        }
    }

    /// Production wiring: HTTP fetcher, zip extractor and the AppX registry.
    pub fn from_config(config: &SwitcherConfig) -> LauncherResult<Self> {
        let fetcher = HttpFetcher::from_template(config.archive_url_template.clone())
            .map_err(|err| LauncherError::Config(err.to_string()))?;
        let registry = AppxRegistry::new(config.package_name.clone());

        let mut switcher = Self::new(
            config.versions_dir.clone(),
            Arc::new(fetcher),
            Arc::new(ZipExtractor),
            Arc::new(registry),
        )
        .with_package_name(config.package_name.clone())
        .with_poll_settings(config.poll_settings())
        .with_developer_mode_request(config.request_developer_mode);

        if let Some(artifact) = &config.proxy_artifact {
            switcher = switcher.with_proxy_artifact(artifact.clone());
        }
        if let Some(bytes) = config.min_free_space_bytes() {
            switcher = switcher.with_min_free_space(bytes);
        }
        Ok(switcher)
    }

    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.registrar = self.registrar.with_package_name(package_name);
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.registrar = self.registrar.with_poll_settings(poll);
        self
    }

    pub fn with_proxy_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.proxy_artifact = Some(artifact.into());
        self
    }

    /// Refuse to start a download when the versions volume has less free space.
    pub fn with_min_free_space(mut self, bytes: u64) -> Self {
        self.min_free_space = Some(bytes);
        self
    }

    pub fn with_developer_mode_request(mut self, request: bool) -> Self {
        self.request_developer_mode = request;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn state(&self) -> StateOracle<'_> {
        StateOracle::new(&self.layout, &self.locks, &self.registrar)
    }

    /// Make `version` the registered package, downloading it first if needed.
    ///
    /// Calling it again for an active version does no work. Only one call
    /// (or [`delete_version`](Self::delete_version)) runs at a time; a second
    /// concurrent call fails with [`LauncherError::Busy`].
    #[instrument(skip_all, fields(version = %version))]
    pub async fn ensure_active(
        &self,
        version: &Version,
        sink: Arc<dyn StatusSink>,
    ) -> LauncherResult<ActivationReport> {
        let _guard = self.busy.try_lock().map_err(|_| LauncherError::Busy)?;
        let started = Instant::now();

        let report = ActivationReport {
            recovered: self.recover_if_locked(version).await?,
            downloaded: self.ensure_downloaded(version, &sink).await?,
            registered: self.ensure_registered(version, sink.as_ref()).await?,
        };

        info!(
            "Version {} active in {:?} ({:?})",
            version,
            started.elapsed(),
            report
        );
        Ok(report)
    }

    /// Remove an installed version that is not currently registered.
    #[instrument(skip_all, fields(version = %version))]
    pub async fn delete_version(&self, version: &Version) -> LauncherResult<()> {
        let _guard = self.busy.try_lock().map_err(|_| LauncherError::Busy)?;

        let active = self
            .state()
            .is_active(version)
            .await
            .map_err(|source| registration_error(version, source))?;
        if active {
            return Err(LauncherError::VersionActive(version.to_string()));
        }

        let sem = &version.sem_version;
        for path in [self.layout.install_dir(sem), self.layout.archive_path(sem)] {
            remove_path(&path)
                .await
                .map_err(|source| LauncherError::Io { path, source })?;
        }
        self.locks
            .remove_lock(sem)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.locks.lock_path(sem),
                source,
            })?;

        info!("Deleted version {}", version);
        Ok(())
    }

    /// Versions present on disk, oldest first.
    pub async fn installed_versions(&self) -> LauncherResult<Vec<InstalledVersion>> {
        let root = self.layout.root();
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LauncherError::Io {
                    path: root.to_path_buf(),
                    source,
                })
            }
        };

        let mut installed = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| LauncherError::Io {
            path: root.to_path_buf(),
            source,
        })? {
            let path = entry.path();
            let is_dir = tokio::fs::metadata(&path)
                .await
                .map(|metadata| metadata.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            let Some(sem_version) = entry.file_name().to_str().and_then(parse_install_dir_name)
            else {
                continue;
            };
            installed.push(InstalledVersion {
                locked: self.locks.is_locked(&sem_version),
                sem_version,
                path,
            });
        }

        installed.sort_by(|a, b| a.sem_version.cmp(&b.sem_version));
        Ok(installed)
    }

    // ── Steps ───────────────────────────────────────────

    /// Discard whatever an interrupted install left behind. The marker goes
    /// last so a crash here is recovered on the next call.
    async fn recover_if_locked(&self, version: &Version) -> LauncherResult<bool> {
        let sem = &version.sem_version;
        if !self.locks.is_locked(sem) {
            return Ok(false);
        }

        warn!("Install marker found for {}, discarding the interrupted install", version);
        let recovery_error = |path: PathBuf, source: std::io::Error| LauncherError::LockRecovery {
            version: version.to_string(),
            path,
            source,
        };

        for path in [self.layout.archive_path(sem), self.layout.install_dir(sem)] {
            if let Err(source) = remove_path(&path).await {
                return Err(recovery_error(path, source));
            }
        }
        if let Err(source) = self.locks.remove_lock(sem).await {
            return Err(recovery_error(self.locks.lock_path(sem), source));
        }

        info!("Recovered interrupted install of {}", version);
        Ok(true)
    }

    async fn ensure_downloaded(
        &self,
        version: &Version,
        sink: &Arc<dyn StatusSink>,
    ) -> LauncherResult<bool> {
        let sem = &version.sem_version;
        if self.layout.is_downloaded(sem) {
            debug!("{} already downloaded", version);
            return Ok(false);
        }

        if let Some(required) = self.min_free_space {
            let root = self.layout.root().to_path_buf();
            tokio::task::spawn_blocking(move || ensure_min_disk_space(&root, required))
                .await
                .map_err(|err| LauncherError::Other(format!("Disk space check failed: {err}")))??;
        }

        self.locks
            .create_lock(sem)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.locks.lock_path(sem),
                source,
            })?;

        match self.download_and_extract(version, sink).await {
            Ok(()) => {
                self.finish_install(sem).await?;
                Ok(true)
            }
            Err(err) => {
                warn!("Install of {} failed: {}", version, err);
                self.discard_install(sem).await;
                Err(err)
            }
        }
    }

    async fn download_and_extract(
        &self,
        version: &Version,
        sink: &Arc<dyn StatusSink>,
    ) -> LauncherResult<()> {
        let sem = &version.sem_version;
        let archive = self.layout.archive_path(sem);
        let install_dir = self.layout.install_dir(sem);

        let download_start = Instant::now();
        info!("Downloading {} ({})", version, version.uuid);
        let on_bytes = |done: u64, total: u64| {
            if total > 0 {
                sink.status(&format!(
                    "Downloading: {} / {}",
                    format_megabytes(done),
                    format_megabytes(total)
                ));
            } else {
                sink.status(&format!("Downloading: {}", format_megabytes(done)));
            }
            sink.progress(Progress::of(done, total));
        };
        self.fetcher
            .fetch(&version.uuid, &archive, &on_bytes)
            .await
            .map_err(|source| LauncherError::Network {
                version: version.to_string(),
                source,
            })?;
        info!("Download finished in {:?}", download_start.elapsed());

        let extract_start = Instant::now();
        let summary = {
            let extractor = Arc::clone(&self.extractor);
            let sink = Arc::clone(sink);
            let exclusions = self.exclusions.clone();
            let archive = archive.clone();
            let dest = install_dir.clone();
            tokio::task::spawn_blocking(move || {
                let mut on_entry = |processed: usize, total: usize, name: &str| {
                    sink.status(&format!("Extracting: {name}"));
                    sink.progress(Progress::of(processed as u64, total as u64));
                };
                extractor.extract(&archive, &dest, &exclusions, &mut on_entry)
            })
            .await
            .map_err(|err| ExtractionError::Aborted(err.to_string()))
            .and_then(|result| result)
            .map_err(|source| extraction_error(version, source))?
        };

        if !summary.is_complete() {
            return Err(extraction_error(
                version,
                ExtractionError::Incomplete {
                    processed: summary.processed,
                    total: summary.total,
                },
            ));
        }
        info!(
            "Extraction finished in {:?} ({} written, {} excluded)",
            extract_start.elapsed(),
            summary.written,
            summary.excluded
        );

        if let Some(artifact) = &self.proxy_artifact {
            let target = install_dir.join(PROXY_ARTIFACT_NAME);
            tokio::fs::copy(artifact, &target).await.map_err(|source| {
                extraction_error(
                    version,
                    ExtractionError::Proxy {
                        source_path: artifact.clone(),
                        source,
                    },
                )
            })?;
            debug!("Installed proxy artifact into {:?}", target);
        }

        Ok(())
    }

    async fn ensure_registered(&self, version: &Version, sink: &dyn StatusSink) -> LauncherResult<bool> {
        let install_dir = self.layout.install_dir(&version.sem_version);
        let wrap = |source: RegistrationError| registration_error(version, source);

        if self.registrar.is_registered_at(&install_dir).await.map_err(wrap)? {
            debug!("{} already registered", version);
            return Ok(false);
        }

        sink.status(&format!("Registering {version}"));
        sink.progress(Progress::Indeterminate);

        let register_start = Instant::now();
        self.registrar
            .ensure_developer_mode(self.request_developer_mode)
            .await
            .map_err(wrap)?;
        self.registrar.unregister().await.map_err(wrap)?;
        let package = self.registrar.register(&install_dir).await.map_err(wrap)?;

        info!(
            "Registered {} as {} in {:?}",
            version,
            package.id,
            register_start.elapsed()
        );
        Ok(true)
    }

    // ── Cleanup ─────────────────────────────────────────

    /// Success path: drop the archive, then the marker. The marker goes even
    /// when the archive cannot; `delete_version` sweeps the archive later.
    async fn finish_install(&self, sem: &SemVersion) -> LauncherResult<()> {
        let archive = self.layout.archive_path(sem);
        match tokio::fs::remove_file(&archive).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Could not remove archive {:?}: {}", archive, err),
        }

        self.locks
            .remove_lock(sem)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.locks.lock_path(sem),
                source,
            })
    }

    /// Failure path: archive, install dir, marker. A failed removal keeps the
    /// marker so the next call recovers.
    async fn discard_install(&self, sem: &SemVersion) {
        for path in [self.layout.archive_path(sem), self.layout.install_dir(sem)] {
            if let Err(err) = remove_path(&path).await {
                warn!("Could not remove {:?}: {}; keeping install marker", path, err);
                return;
            }
        }
        if let Err(err) = self.locks.remove_lock(sem).await {
            warn!("Could not remove install marker for {}: {}", sem, err);
        }
    }
}

fn extraction_error(version: &Version, source: ExtractionError) -> LauncherError {
    LauncherError::Extraction {
        version: version.to_string(),
        source,
    }
}

fn registration_error(version: &Version, source: RegistrationError) -> LauncherError {
    LauncherError::Registration {
        version: version.to_string(),
        source,
    }
}

/// Remove a file or directory tree; absent paths are fine.
async fn remove_path(path: &Path) -> std::io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Free space on the volume holding `path` (longest matching mount point).
/// Unknown volumes pass.
fn ensure_min_disk_space(path: &Path, required: u64) -> LauncherResult<()> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let anchor = nearest_existing(path);
    let canonical = std::fs::canonicalize(&anchor).unwrap_or(anchor);

    let mut best_len = 0usize;
    let mut available = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if canonical.starts_with(mount) {
            let len = mount.as_os_str().len();
            if len >= best_len {
                best_len = len;
                available = Some(disk.available_space());
            }
        }
    }

    match available {
        Some(bytes) if bytes < required => Err(LauncherError::InsufficientSpace {
            path: path.to_path_buf(),
            available: bytes,
            required,
        }),
        _ => Ok(()),
    }
}

fn nearest_existing(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|candidate| candidate.exists())
        .unwrap_or(path)
        .to_path_buf()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::core::registrar::MANIFEST_FILE;
    use crate::core::test_support::{
        package_archive, FailingExtractor, FakeFetcher, FakeRegistry, IncompleteExtractor,
        ObstructingExtractor, RecordingSink,
    };
    use crate::core::version::Channel;

    struct Harness {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        fetcher: Arc<FakeFetcher>,
        registry: Arc<FakeRegistry>,
        switcher: VersionSwitcher,
    }

    fn harness_with(extractor: Arc<dyn ArchiveExtractor>) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("versions");
        let fetcher = Arc::new(FakeFetcher::serving(package_archive("1.0.0.0")));
        let registry = Arc::new(FakeRegistry::default());
        let switcher = VersionSwitcher::new(&root, fetcher.clone(), extractor, registry.clone())
            .with_poll_settings(PollSettings {
                attempts: 2,
                interval: Duration::from_millis(1),
            });
        Harness {
            _tmp: tmp,
            root,
            fetcher,
            registry,
            switcher,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(ZipExtractor))
    }

    fn version(raw: &str) -> Version {
        Version::new(raw.parse().unwrap(), Uuid::new_v4(), Channel::Release)
    }

    #[tokio::test]
    async fn fresh_version_is_downloaded_and_registered() {
        let h = harness();
        let v = version("1.21.2.2");
        let sink = Arc::new(RecordingSink::default());

        let report = h.switcher.ensure_active(&v, sink.clone()).await.unwrap();
        assert_eq!(
            report,
            ActivationReport {
                recovered: false,
                downloaded: true,
                registered: true
            }
        );

        let dir = h.root.join("Minecraft-1.21.2.2");
        assert!(dir.join(MANIFEST_FILE).is_file());
        assert!(dir.join("data/resource_packs/vanilla/manifest.json").is_file());
        assert!(!dir.join("AppxSignature.p7x").exists());
        assert!(!h.root.join("Minecraft-1.21.2.2.zip").exists());

        let state = h.switcher.state();
        assert!(state.is_downloaded(&v));
        assert!(!state.is_locked(&v));
        assert!(state.is_active(&v).await.unwrap());

        let statuses = sink.statuses();
        assert!(statuses.iter().any(|s| s.starts_with("Downloading: ")));
        assert!(statuses.iter().any(|s| s == "Extracting: AppxManifest.xml"));
        assert_eq!(sink.progress().last(), Some(&Progress::Indeterminate));
    }

    #[tokio::test]
    async fn second_call_does_no_work() {
        let h = harness();
        let v = version("1.21.2.2");

        h.switcher.ensure_active(&v, Arc::new(RecordingSink::default())).await.unwrap();
        let report = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();

        assert_eq!(report, ActivationReport::default());
        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(h.registry.registrations(), 1);
        assert_eq!(h.registry.removals(), 0);
    }

    #[tokio::test]
    async fn interrupted_install_is_discarded_and_redone() {
        let h = harness();
        let v = version("1.20.81.1");
        let dir = h.root.join("Minecraft-1.20.81.1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("stale.bin"), b"half written").unwrap();
        std::fs::write(h.root.join("Minecraft-1.20.81.1.zip"), b"PK\x03").unwrap();
        std::fs::write(h.root.join("Minecraft-1.20.81.1.lock"), b"").unwrap();

        let report = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();

        assert!(report.recovered);
        assert!(report.downloaded);
        assert!(!dir.join("stale.bin").exists());
        assert!(dir.join(MANIFEST_FILE).is_file());
        assert!(!h.switcher.state().is_locked(&v));
        assert_eq!(h.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn marker_without_install_dir_is_recovered() {
        let h = harness();
        let v = version("1.20.81.1");
        std::fs::create_dir_all(&h.root).unwrap();
        std::fs::write(h.root.join("Minecraft-1.20.81.1.lock"), b"").unwrap();
        assert!(!h.switcher.state().is_downloaded(&v));

        let report = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();

        assert!(report.recovered);
        assert!(report.downloaded);
        let state = h.switcher.state();
        assert!(state.is_downloaded(&v));
        assert!(!state.is_locked(&v));
        assert!(state.is_active(&v).await.unwrap());
    }

    #[tokio::test]
    async fn switching_leaves_only_the_new_version_active() {
        let h = harness();
        let v1 = version("1.20.0.1");
        let v2 = version("1.21.0.3");

        h.switcher.ensure_active(&v1, Arc::new(RecordingSink::default())).await.unwrap();
        h.switcher.ensure_active(&v2, Arc::new(RecordingSink::default())).await.unwrap();

        let state = h.switcher.state();
        assert!(state.is_active(&v2).await.unwrap());
        assert!(!state.is_active(&v1).await.unwrap());
        assert!(state.is_downloaded(&v1));
        assert_eq!(h.registry.removals(), 1);

        // Switching back only registers.
        let report = h
            .switcher
            .ensure_active(&v1, Arc::new(RecordingSink::default()))
            .await
            .unwrap();
        assert!(!report.downloaded);
        assert!(report.registered);
        assert_eq!(h.fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn failed_extraction_rolls_back() {
        let h = harness_with(Arc::new(FailingExtractor));
        let v = version("1.21.2.2");

        let err = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Extraction { .. }));
        assert!(err.is_retryable());
        assert!(!h.root.join("Minecraft-1.21.2.2").exists());
        assert!(!h.root.join("Minecraft-1.21.2.2.zip").exists());
        assert!(!h.root.join("Minecraft-1.21.2.2.lock").exists());
        assert_eq!(h.registry.registrations(), 0);
    }

    #[tokio::test]
    async fn incomplete_extraction_rolls_back() {
        let h = harness_with(Arc::new(IncompleteExtractor));
        let v = version("1.21.2.2");

        let err = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LauncherError::Extraction {
                source: ExtractionError::Incomplete {
                    processed: 1,
                    total: 2
                },
                ..
            }
        ));
        assert!(!h.root.join("Minecraft-1.21.2.2").exists());
        assert!(!h.root.join("Minecraft-1.21.2.2.zip").exists());
        assert!(!h.root.join("Minecraft-1.21.2.2.lock").exists());
        assert_eq!(h.registry.registrations(), 0);
    }

    #[tokio::test]
    async fn stuck_archive_does_not_keep_the_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("versions");
        let extractor = ObstructingExtractor::new(root.join("Minecraft-1.21.2.2.zip"));
        let fetcher = Arc::new(FakeFetcher::serving(package_archive("1.0.0.0")));
        let registry = Arc::new(FakeRegistry::default());
        let switcher = VersionSwitcher::new(&root, fetcher.clone(), Arc::new(extractor), registry)
            .with_poll_settings(PollSettings {
                attempts: 2,
                interval: Duration::from_millis(1),
            });
        let v = version("1.21.2.2");

        let report = switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();
        assert!(report.downloaded && report.registered);
        assert!(!switcher.state().is_locked(&v));
        assert!(switcher.state().is_active(&v).await.unwrap());

        let again = switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();
        assert_eq!(again, ActivationReport::default());
        assert_eq!(fetcher.calls(), 1);
        assert!(root.join("Minecraft-1.21.2.2").join(MANIFEST_FILE).is_file());
    }

    #[tokio::test]
    async fn marker_that_cannot_be_removed_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("versions");
        let lock = root.join("Minecraft-1.21.2.2.lock");
        let extractor = ObstructingExtractor::new(lock.clone());
        let fetcher = Arc::new(FakeFetcher::serving(package_archive("1.0.0.0")));
        let registry = Arc::new(FakeRegistry::default());
        let switcher = VersionSwitcher::new(&root, fetcher, Arc::new(extractor), registry.clone())
            .with_poll_settings(PollSettings {
                attempts: 2,
                interval: Duration::from_millis(1),
            });

        let err = switcher
            .ensure_active(&version("1.21.2.2"), Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Io { ref path, .. } if path == &lock));
        assert_eq!(registry.registrations(), 0);
    }

    #[tokio::test]
    async fn failed_download_rolls_back_and_can_be_retried() {
        let h = harness();
        let v = version("1.21.2.2");
        h.fetcher.set_failing(true);

        let err = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Network { .. }));
        assert!(!h.root.join("Minecraft-1.21.2.2.zip").exists());
        assert!(!h.switcher.state().is_locked(&v));

        h.fetcher.set_failing(false);
        let report = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();
        assert!(!report.recovered);
        assert!(report.downloaded);
    }

    #[tokio::test]
    async fn concurrent_call_is_rejected() {
        let h = harness();
        let v = version("1.21.2.2");

        let held = h.switcher.busy.try_lock().unwrap();
        let err = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Busy));
        assert!(matches!(
            h.switcher.delete_version(&v).await.unwrap_err(),
            LauncherError::Busy
        ));
        assert_eq!(h.fetcher.calls(), 0);
        drop(held);

        h.switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registration_timeout_keeps_the_download() {
        let h = harness();
        let v = version("1.21.2.2");
        h.registry.set_ignore_registration(true);

        let err = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LauncherError::Registration {
                source: RegistrationError::Timeout { attempts: 2 },
                ..
            }
        ));
        assert!(!err.is_retryable());

        let state = h.switcher.state();
        assert!(state.is_downloaded(&v));
        assert!(!state.is_locked(&v));
    }

    #[tokio::test]
    async fn disabled_developer_mode_blocks_registration() {
        let h = harness();
        let v = version("1.21.2.2");
        h.registry.set_developer_mode(false);

        let err = h
            .switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LauncherError::Registration {
                source: RegistrationError::DeveloperModeDisabled,
                ..
            }
        ));
        assert_eq!(h.registry.registrations(), 0);
    }

    #[tokio::test]
    async fn proxy_artifact_is_copied_into_the_install() {
        let h = harness();
        let artifact = h.root.parent().unwrap().join("proxy.dll");
        std::fs::write(&artifact, b"proxy").unwrap();
        let switcher = h.switcher.with_proxy_artifact(&artifact);
        let v = version("1.21.2.2");

        switcher.ensure_active(&v, Arc::new(RecordingSink::default())).await.unwrap();
        let installed = h.root.join("Minecraft-1.21.2.2").join(PROXY_ARTIFACT_NAME);
        assert_eq!(std::fs::read(installed).unwrap(), b"proxy");
    }

    #[tokio::test]
    async fn delete_refuses_the_active_version() {
        let h = harness();
        let v1 = version("1.20.0.1");
        let v2 = version("1.21.0.3");
        h.switcher.ensure_active(&v1, Arc::new(RecordingSink::default())).await.unwrap();
        h.switcher.ensure_active(&v2, Arc::new(RecordingSink::default())).await.unwrap();

        let err = h.switcher.delete_version(&v2).await.unwrap_err();
        assert!(matches!(err, LauncherError::VersionActive(_)));

        h.switcher.delete_version(&v1).await.unwrap();
        assert!(!h.switcher.state().is_downloaded(&v1));
        assert!(h.switcher.state().is_downloaded(&v2));
    }

    #[tokio::test]
    async fn space_check_runs_before_a_fresh_install() {
        let h = harness();
        let switcher = h.switcher.with_min_free_space(0);
        let v = version("1.21.2.2");

        let report = switcher
            .ensure_active(&v, Arc::new(RecordingSink::default()))
            .await
            .unwrap();

        assert!(report.downloaded);
        assert_eq!(h.fetcher.calls(), 1);
        assert!(switcher.state().is_downloaded(&v));
    }

    #[tokio::test]
    async fn lists_installed_versions_in_order() {
        let h = harness();
        assert!(h.switcher.installed_versions().await.unwrap().is_empty());

        std::fs::create_dir_all(h.root.join("Minecraft-1.21.0.3")).unwrap();
        std::fs::create_dir_all(h.root.join("Minecraft-1.20.0.1")).unwrap();
        std::fs::create_dir_all(h.root.join("Screenshots")).unwrap();
        std::fs::write(h.root.join("Minecraft-1.21.0.3.lock"), b"").unwrap();

        let installed = h.switcher.installed_versions().await.unwrap();
        let versions: Vec<String> = installed.iter().map(|i| i.sem_version.to_string()).collect();
        assert_eq!(versions, vec!["1.20.0.1", "1.21.0.3"]);
        assert!(!installed[0].locked);
        assert!(installed[1].locked);
    }

    #[test]
    fn zero_space_requirement_always_passes() {
        let tmp = tempfile::tempdir().unwrap();
        ensure_min_disk_space(&tmp.path().join("not/yet/created"), 0).unwrap();
    }
}
