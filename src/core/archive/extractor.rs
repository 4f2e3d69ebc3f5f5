use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::error::ExtractionError;

/// Package metadata that is meaningless (and in the way) once the package is
/// registered from loose files.
pub const APPX_METADATA_EXCLUSIONS: [&str; 5] = [
    "AppxMetadata/CodeIntegrity.cat",
    "AppxMetadata",
    "AppxBlockMap.xml",
    "AppxSignature.p7x",
    "[Content_Types].xml",
];

pub fn default_exclusions() -> Vec<String> {
    APPX_METADATA_EXCLUSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `(processed, total_non_dir_entries, entry_name)`, fired once per written or
/// excluded entry.
pub type EntryProgress<'a> = &'a mut (dyn FnMut(usize, usize, &str) + Send);

/// Outcome of one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Entries written or skipped through the exclusion list.
    pub processed: usize,
    /// Non-directory entries in the archive.
    pub total: usize,
    pub written: usize,
    pub excluded: usize,
}

impl ExtractionSummary {
    /// Every entry was accounted for.
    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}

/// Expands an archive into a directory.
///
/// Entry failures do not abort the run; they surface as an incomplete
/// [`ExtractionSummary`]. Only an unreadable archive or an uncreatable
/// destination is an `Err`.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        exclusions: &[String],
        on_progress: EntryProgress<'_>,
    ) -> Result<ExtractionSummary, ExtractionError>;
}

/// Zip (and AppX, which is a zip container) extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

struct PlannedEntry {
    index: usize,
    name: String,
    /// `None` when the entry name escapes the destination.
    target: Option<PathBuf>,
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest: &Path,
        exclusions: &[String],
        on_progress: EntryProgress<'_>,
    ) -> Result<ExtractionSummary, ExtractionError> {
        let started = Instant::now();

        std::fs::create_dir_all(dest).map_err(|source| ExtractionError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        let zip_file = File::open(archive_path).map_err(|source| ExtractionError::Io {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let mut archive = zip::ZipArchive::new(zip_file)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let zipped = archive.by_index(index)?;
            if zipped.is_dir() {
                continue;
            }
            entries.push(PlannedEntry {
                index,
                name: zipped.name().to_string(),
                target: zipped.enclosed_name().map(|rel| dest.join(rel)),
            });
        }

        let is_excluded = |name: &str| exclusions.iter().any(|ex| ex == name);
        let mut summary = ExtractionSummary {
            total: entries.len(),
            ..ExtractionSummary::default()
        };
        info!(
            "Extracting {} entries from {:?} into {:?}",
            summary.total, archive_path, dest
        );

        // Pass 1: directories for everything that will be written.
        for entry in entries.iter().filter(|e| !is_excluded(e.name.as_str())) {
            let Some(parent) = entry.target.as_deref().and_then(Path::parent) else {
                continue;
            };
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("Error creating dir for {:?}: {}", entry.name, err);
            }
        }

        // Pass 2: contents, one entry at a time.
        for entry in &entries {
            if is_excluded(entry.name.as_str()) {
                summary.processed += 1;
                summary.excluded += 1;
                on_progress(summary.processed, summary.total, &entry.name);
                continue;
            }

            let Some(target) = entry.target.as_deref() else {
                warn!("Skipping entry with unsafe path {:?}", entry.name);
                continue;
            };

            match write_entry(&mut archive, entry.index, target) {
                Ok(()) => {
                    summary.processed += 1;
                    summary.written += 1;
                    on_progress(summary.processed, summary.total, &entry.name);
                }
                Err(err) => warn!("Error extracting {:?}: {}", entry.name, err),
            }
        }

        debug!(
            "Extraction finished in {:?}: {}/{} processed ({} excluded)",
            started.elapsed(),
            summary.processed,
            summary.total,
            summary.excluded
        );
        Ok(summary)
    }
}

fn write_entry(
    archive: &mut zip::ZipArchive<File>,
    index: usize,
    target: &Path,
) -> Result<(), ExtractionError> {
    let mut zipped = archive.by_index(index)?;
    let mut out = File::create(target).map_err(|source| ExtractionError::Io {
        path: target.to_path_buf(),
        source,
    })?;
    std::io::copy(&mut zipped, &mut out).map_err(|source| ExtractionError::Io {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(())
}
