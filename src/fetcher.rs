//! Blob Fetching
//!
//! The fetcher contract consumed by the cache engine, plus an HTTP
//! implementation for the server binary.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Content type used when the upstream does not report one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw bytes and content type returned by a fetch.
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Resolves a cache key to its bytes.
///
/// Failures surface as `CacheError::FetchFailed`. The cache engine never
/// retries a failed fetch.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<FetchedBlob>;
}

// == HTTP Fetcher ==
/// Fetches keys as URLs over HTTP(S).
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("image_cache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CacheError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BlobFetcher for HttpFetcher {
    async fn fetch(&self, key: &str) -> Result<FetchedBlob> {
        debug!(url = %key, "Fetching blob");

        let response = self
            .client
            .get(key)
            .header(header::ACCEPT, "image/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %key, status = %status, "Upstream returned an error status");
            return Err(CacheError::FetchFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown")
            )));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response.bytes().await?;

        debug!(
            url = %key,
            size = bytes.len(),
            content_type = %content_type,
            "Fetched blob"
        );

        Ok(FetchedBlob {
            bytes,
            content_type,
        })
    }
}
