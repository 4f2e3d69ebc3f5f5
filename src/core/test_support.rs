//! In-memory stand-ins for the OS and network seams, shared by unit tests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::archive::{ArchiveExtractor, EntryProgress, ExtractionSummary, ZipExtractor};
use crate::core::downloader::{ArchiveFetcher, ByteProgress};
use crate::core::error::{ExtractionError, FetchError, RegistrationError};
use crate::core::progress::{Progress, StatusSink};
use crate::core::registrar::{PackageRegistry, RegisteredPackage, MANIFEST_FILE};

pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, files: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, zip_bytes(files)).unwrap();
}

pub fn manifest_xml(name: &str, version: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Package xmlns="http://schemas.microsoft.com/appx/manifest/foundation/windows10">
  <Identity Name="{name}" Publisher="CN=Microsoft Corporation" Version="{version}" ProcessorArchitecture="x64" />
</Package>"#
    )
}

pub fn write_manifest(dir: &Path, name: &str, version: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(MANIFEST_FILE), manifest_xml(name, version)).unwrap();
}

/// A package archive as the switcher expects it: manifest plus payload plus
/// the metadata that gets excluded.
pub fn package_archive(version: &str) -> Vec<u8> {
    let manifest = manifest_xml("Microsoft.MinecraftUWP", version);
    zip_bytes(&[
        (MANIFEST_FILE, manifest.as_str()),
        ("Minecraft.Windows.exe", "MZ"),
        ("data/resource_packs/vanilla/manifest.json", "{}"),
        ("AppxSignature.p7x", "sig"),
        ("AppxBlockMap.xml", "<BlockMap/>"),
    ])
}

// ─── Registry ───

#[derive(Debug)]
struct RegistryState {
    current: Option<RegisteredPackage>,
    developer_mode: bool,
    ignore_removal: bool,
    ignore_registration: bool,
    removals: usize,
    registrations: usize,
}

#[derive(Debug)]
pub struct FakeRegistry {
    state: Mutex<RegistryState>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                current: None,
                developer_mode: true,
                ignore_removal: false,
                ignore_registration: false,
                removals: 0,
                registrations: 0,
            }),
        }
    }
}

impl FakeRegistry {
    pub fn set_current(&self, root: &Path, id: &str) {
        self.state.lock().unwrap().current = Some(RegisteredPackage {
            id: id.to_string(),
            root: root.to_path_buf(),
        });
    }

    pub fn current(&self) -> Option<RegisteredPackage> {
        self.state.lock().unwrap().current.clone()
    }

    pub fn set_developer_mode(&self, enabled: bool) {
        self.state.lock().unwrap().developer_mode = enabled;
    }

    /// Removal "succeeds" but the package stays.
    pub fn set_ignore_removal(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_removal = ignore;
    }

    /// Registration "succeeds" but never becomes visible.
    pub fn set_ignore_registration(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_registration = ignore;
    }

    pub fn removals(&self) -> usize {
        self.state.lock().unwrap().removals
    }

    pub fn registrations(&self) -> usize {
        self.state.lock().unwrap().registrations
    }
}

#[async_trait]
impl PackageRegistry for FakeRegistry {
    async fn query(&self) -> Result<Option<RegisteredPackage>, RegistrationError> {
        Ok(self.current())
    }

    async fn remove(&self, package_id: &str) -> Result<(), RegistrationError> {
        let mut state = self.state.lock().unwrap();
        state.removals += 1;
        let matches = state
            .current
            .as_ref()
            .map(|p| p.id == package_id)
            .unwrap_or(false);
        if matches && !state.ignore_removal {
            state.current = None;
        }
        Ok(())
    }

    async fn register_manifest(&self, manifest: &Path) -> Result<(), RegistrationError> {
        let mut state = self.state.lock().unwrap();
        state.registrations += 1;
        if state.ignore_registration {
            return Ok(());
        }
        let root = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let version = root
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("Minecraft-"))
            .unwrap_or("0.0.0.0")
            .to_string();
        state.current = Some(RegisteredPackage {
            id: format!("Microsoft.MinecraftUWP_{version}_x64__8wekyb3d8bbwe"),
            root,
        });
        Ok(())
    }

    async fn developer_mode_enabled(&self) -> Result<bool, RegistrationError> {
        Ok(self.state.lock().unwrap().developer_mode)
    }

    async fn enable_developer_mode(&self) -> Result<bool, RegistrationError> {
        self.state.lock().unwrap().developer_mode = true;
        Ok(true)
    }
}

// ─── Fetcher ───

pub struct FakeFetcher {
    archive: Vec<u8>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeFetcher {
    pub fn serving(archive: Vec<u8>) -> Self {
        Self {
            archive,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Next fetches write half the archive and then fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _source: &Uuid,
        dest: &Path,
        on_progress: ByteProgress<'_>,
    ) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }

        let total = self.archive.len() as u64;
        if self.fail.load(Ordering::SeqCst) {
            let half = &self.archive[..self.archive.len() / 2];
            std::fs::write(dest, half).unwrap();
            on_progress(half.len() as u64, total);
            return Err(FetchError::Source("connection reset by peer".into()));
        }

        std::fs::write(dest, &self.archive).unwrap();
        on_progress(total, total);
        Ok(())
    }
}

// ─── Extractor ───

/// Writes one file into the destination, then fails.
pub struct FailingExtractor;

impl ArchiveExtractor for FailingExtractor {
    fn extract(
        &self,
        _archive: &Path,
        dest: &Path,
        _exclusions: &[String],
        on_progress: EntryProgress<'_>,
    ) -> Result<ExtractionSummary, ExtractionError> {
        std::fs::create_dir_all(dest).unwrap();
        std::fs::write(dest.join("partial.bin"), b"half").unwrap();
        on_progress(1, 2, "partial.bin");
        Err(ExtractionError::Aborted("disk went away".into()))
    }
}

/// Reports one of two entries as processed without failing.
pub struct IncompleteExtractor;

impl ArchiveExtractor for IncompleteExtractor {
    fn extract(
        &self,
        _archive: &Path,
        dest: &Path,
        _exclusions: &[String],
        on_progress: EntryProgress<'_>,
    ) -> Result<ExtractionSummary, ExtractionError> {
        std::fs::create_dir_all(dest).unwrap();
        std::fs::write(dest.join("first.bin"), b"first").unwrap();
        on_progress(1, 2, "first.bin");
        Ok(ExtractionSummary {
            processed: 1,
            total: 2,
            written: 1,
            excluded: 0,
        })
    }
}

/// Extracts normally, then swaps `target` for a non-empty directory so a
/// later `remove_file` on it fails.
pub struct ObstructingExtractor {
    target: PathBuf,
}

impl ObstructingExtractor {
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }
}

impl ArchiveExtractor for ObstructingExtractor {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        exclusions: &[String],
        on_progress: EntryProgress<'_>,
    ) -> Result<ExtractionSummary, ExtractionError> {
        let summary = ZipExtractor.extract(archive, dest, exclusions, on_progress)?;
        std::fs::remove_file(&self.target).unwrap();
        std::fs::create_dir_all(self.target.join("held")).unwrap();
        Ok(summary)
    }
}

// ─── Status ───

#[derive(Default)]
pub struct RecordingSink {
    statuses: Mutex<Vec<String>>,
    progress: Mutex<Vec<Progress>>,
}

impl RecordingSink {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<Progress> {
        self.progress.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn progress(&self, progress: Progress) {
        self.progress.lock().unwrap().push(progress);
    }
}
