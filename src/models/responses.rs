//! Response DTOs for the image cache API
//!
//! Defines the structure of outgoing JSON response bodies.

use serde::Serialize;

use crate::cache::{BlobHandle, CacheStats};
use crate::error::CacheError;

/// Response body for GET /cached
#[derive(Debug, Clone, Serialize)]
pub struct CachedResponse {
    pub url: String,
    pub cached: bool,
}

/// Outcome for one URL of a batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn from_outcome(url: impl Into<String>, outcome: &Result<BlobHandle, CacheError>) -> Self {
        match outcome {
            Ok(handle) => Self {
                url: url.into(),
                ok: true,
                size: Some(handle.size()),
                error: None,
            },
            Err(e) => Self {
                url: url.into(),
                ok: false,
                size: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Response body for POST /cache
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl BatchResponse {
    pub fn new(results: Vec<BatchItem>) -> Self {
        let succeeded = results.iter().filter(|r| r.ok).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

/// Response body for POST /preload
#[derive(Debug, Clone, Serialize)]
pub struct PreloadResponse {
    pub requested: usize,
    pub promoted: usize,
}

/// Response body for POST /cleanup
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

/// Response body for DELETE operations
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MessageResponse {
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".to_string(),
            url: None,
        }
    }

    pub fn deleted(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            message: format!("Entry '{}' deleted successfully", url),
            url: Some(url),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status: "healthy", or "degraded" without a durable store
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub caching_enabled: bool,
}

impl HealthResponse {
    /// Creates a HealthResponse with the current timestamp
    pub fn new(caching_enabled: bool) -> Self {
        let status = if caching_enabled { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            caching_enabled,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_batch_response_counts() {
        let ok: Result<BlobHandle, CacheError> =
            Ok(BlobHandle::new("https://a/1.png", Bytes::from_static(b"abc"), "image/png"));
        let failed: Result<BlobHandle, CacheError> =
            Err(CacheError::FetchFailed("HTTP 404: Not Found".to_string()));

        let resp = BatchResponse::new(vec![
            BatchItem::from_outcome("https://a/1.png", &ok),
            BatchItem::from_outcome("https://a/2.png", &failed),
        ]);

        assert_eq!(resp.total, 2);
        assert_eq!(resp.succeeded, 1);
        assert_eq!(resp.failed, 1);
        assert_eq!(resp.results[0].size, Some(3));

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("HTTP 404"));
    }

    #[test]
    fn test_stats_response_flattens() {
        let mut stats = CacheStats::new();
        stats.hits = 3;
        stats.misses = 1;
        stats.l1_entries = 2;

        let resp = StatsResponse::from(stats);
        assert!((resp.hit_rate - 0.75).abs() < 0.001);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["l1_entries"], 2);
        assert_eq!(json["hits"], 3);
        assert!(json.get("stats").is_none());
    }

    #[test]
    fn test_health_response_reflects_mode() {
        assert_eq!(HealthResponse::new(true).status, "healthy");
        let degraded = HealthResponse::new(false);
        assert_eq!(degraded.status, "degraded");
        assert!(!degraded.caching_enabled);
    }

    #[test]
    fn test_message_response_serialize() {
        let json = serde_json::to_string(&MessageResponse::deleted("https://a/1.png")).unwrap();
        assert!(json.contains("deleted successfully"));

        let json = serde_json::to_string(&MessageResponse::cleared()).unwrap();
        assert!(!json.contains("url"));
    }

    #[test]
    fn test_error_response_serialize() {
        let json = serde_json::to_string(&ErrorResponse::new("Something went wrong")).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
