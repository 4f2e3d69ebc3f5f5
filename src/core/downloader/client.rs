use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::FetchError;

/// `(bytes_transferred, total_bytes)`; `total_bytes` is 0 when the server did
/// not announce a length.
pub type ByteProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Streams one archive to disk.
///
/// Implementations never retry and never delete what they wrote: a failed
/// fetch leaves the partial file for the caller's cleanup.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(
        &self,
        source: &Uuid,
        dest: &Path,
        on_progress: ByteProgress<'_>,
    ) -> Result<(), FetchError>;
}

const USER_AGENT: &str = concat!("BedrockSwitcher/", env!("CARGO_PKG_VERSION"));

/// Placeholder substituted with the content identifier in URL templates.
pub const UUID_PLACEHOLDER: &str = "{uuid}";

/// HTTP fetcher resolving content identifiers through a URL template such as
/// `https://mirror.example/packages/{uuid}.appx`.
pub struct HttpFetcher {
    client: Client,
    url_template: String,
}

impl HttpFetcher {
    pub fn new(client: Client, url_template: impl Into<String>) -> Result<Self, FetchError> {
        let url_template = url_template.into();
        if !url_template.contains(UUID_PLACEHOLDER) {
            return Err(FetchError::Source(format!(
                "URL template {url_template:?} has no {UUID_PLACEHOLDER} placeholder"
            )));
        }

        Ok(Self {
            client,
            url_template,
        })
    }

    /// Fetcher with its own client. Archives are requested with `identity`
    /// encoding so `Content-Length` matches the bytes written.
    pub fn from_template(url_template: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(HeaderMap::from_iter([(
                ACCEPT_ENCODING,
                HeaderValue::from_static("identity"),
            )]))
            .build()?;
        Self::new(client, url_template)
    }

    pub fn resolve_url(&self, source: &Uuid) -> String {
        self.url_template
            .replace(UUID_PLACEHOLDER, &source.hyphenated().to_string())
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &Uuid,
        dest: &Path,
        on_progress: ByteProgress<'_>,
    ) -> Result<(), FetchError> {
        let url = self.resolve_url(source);

        // Ensure parent dir exists
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let started = Instant::now();
        info!("Downloading {} -> {:?}", url, dest);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length().unwrap_or(0);

        // Write inside a block so the handle is dropped before returning
        let transferred = {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|source| FetchError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;

            let mut stream = response.bytes_stream();
            let mut transferred = 0_u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|source| FetchError::Io {
                        path: dest.to_path_buf(),
                        source,
                    })?;

                transferred = transferred.saturating_add(chunk.len() as u64);
                on_progress(transferred, total_bytes);
            }

            file.flush().await.map_err(|source| FetchError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
            transferred
        };

        debug!(
            "Downloaded {} bytes from {} in {:?}",
            transferred,
            url,
            started.elapsed()
        );
        Ok(())
    }
}
