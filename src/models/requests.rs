//! Request DTOs for the image cache API
//!
//! Defines the structure of incoming query strings and JSON bodies.

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Maximum number of URLs accepted by a batch request
pub const MAX_BATCH_URLS: usize = 500;

/// Chunk size used by batch caching when the request does not set one
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Query string carrying a single image URL (`?url=...`)
#[derive(Debug, Clone, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

impl UrlQuery {
    /// Validates the URL, returning an error message if invalid.
    pub fn validate(&self) -> Option<String> {
        validate_url(&self.url)
    }
}

/// Request body for batch caching (POST /cache)
#[derive(Debug, Clone, Deserialize)]
pub struct CacheManyRequest {
    /// URLs to fetch and cache
    pub urls: Vec<String>,
    /// How many URLs to fetch at once
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl CacheManyRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.concurrency == Some(0) {
            return Some("Concurrency must be at least 1".to_string());
        }
        validate_batch(&self.urls)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }
}

/// Request body for memory preloading (POST /preload)
#[derive(Debug, Clone, Deserialize)]
pub struct PreloadRequest {
    pub urls: Vec<String>,
}

impl PreloadRequest {
    pub fn validate(&self) -> Option<String> {
        validate_batch(&self.urls)
    }
}

/// Request body for LRU cleanup (POST /cleanup)
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupRequest {
    /// Fraction of durable entries to remove, between 0 and 1
    pub fraction: f64,
}

/// Checks a cache key is a plausible absolute HTTP(S) URL.
pub fn validate_url(url: &str) -> Option<String> {
    if url.is_empty() {
        return Some("URL cannot be empty".to_string());
    }
    if url.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "URL exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Some("URL must start with http:// or https://".to_string());
    }
    None
}

fn validate_batch(urls: &[String]) -> Option<String> {
    if urls.is_empty() {
        return Some("At least one URL is required".to_string());
    }
    if urls.len() > MAX_BATCH_URLS {
        return Some(format!(
            "Batch exceeds maximum of {} URLs",
            MAX_BATCH_URLS
        ));
    }
    urls.iter().find_map(|url| validate_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_many_request_deserialize() {
        let json = r#"{"urls": ["https://a/1.png", "https://a/2.png"]}"#;
        let req: CacheManyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.urls.len(), 2);
        assert!(req.concurrency.is_none());
        assert_eq!(req.concurrency(), DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_cache_many_request_with_concurrency() {
        let json = r#"{"urls": ["https://a/1.png"], "concurrency": 3}"#;
        let req: CacheManyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.concurrency(), 3);
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("").is_some());
        assert!(validate_url("ftp://a/b.png").is_some());
        assert!(validate_url(&format!("https://{}", "x".repeat(MAX_KEY_LENGTH))).is_some());
        assert!(validate_url("https://cdn.example/emoji.gif").is_none());
    }

    #[test]
    fn test_validate_batch_limits() {
        let req = PreloadRequest { urls: vec![] };
        assert!(req.validate().is_some());

        let req = PreloadRequest {
            urls: vec!["https://a/1.png".to_string(); MAX_BATCH_URLS + 1],
        };
        assert!(req.validate().is_some());

        let req = CacheManyRequest {
            urls: vec!["https://a/1.png".to_string(), "bad".to_string()],
            concurrency: None,
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let req = CacheManyRequest {
            urls: vec!["https://a/1.png".to_string()],
            concurrency: Some(0),
        };
        assert!(req.validate().is_some());
    }
}
