pub mod extractor;

pub use extractor::{
    default_exclusions, ArchiveExtractor, EntryProgress, ExtractionSummary, ZipExtractor,
    APPX_METADATA_EXCLUSIONS,
};
