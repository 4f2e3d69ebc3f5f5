pub mod client;

pub use client::{ArchiveFetcher, ByteProgress, HttpFetcher};
