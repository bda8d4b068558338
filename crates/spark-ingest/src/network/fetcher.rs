//! Artifact fetching over HTTP.

use crate::config::{IngestConfig, NetworkConfig};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

/// Response body as a stream of chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// An opened download.
pub struct FetchedBody {
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

impl std::fmt::Debug for FetchedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens a byte stream for an artifact URL.
///
/// Errors from `fetch` and from the stream both fail the queue item.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedBody>;
}

/// reqwest-backed fetcher.
///
/// Only the connect phase has a timeout; bodies of several gigabytes must be
/// allowed to stream for as long as they keep making progress.
pub struct HttpFetcher {
    client: Client,
    api_key: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(NetworkConfig::DOWNLOAD_CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| IngestError::Network {
                message: format!("Failed to create download client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            api_key: config.registry_api_key.clone(),
        })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        debug!("Opening download stream for {}", url);

        let mut request = self.client.get(url);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| IngestError::Network {
            message: format!("GET {} failed: {}", url, e),
            cause: Some(url.to_string()),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Network {
                message: format!("Download failed with status {}", status),
                cause: Some(url.to_string()),
            });
        }

        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| IngestError::Network {
                    message: format!("Error reading download stream: {}", e),
                    cause: None,
                })
            })
            .boxed();

        Ok(FetchedBody {
            content_length,
            stream,
        })
    }
}
