//! Error types for the image cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine and its HTTP surface.
///
/// The type is `Clone` because a single fetch result is shared by every
/// caller waiting on the same key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Durable backend could not be initialized
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Network or HTTP failure while fetching a blob
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// A single blob exceeds a tier's budget
    #[error("Entry too large: {key} is {size} bytes, budget is {budget} bytes")]
    EntryTooLarge { key: String, size: u64, budget: u64 },

    /// A stored entry could not be decoded
    #[error("Corrupt entry: {0}")]
    CorruptEntry(String),

    /// Durable store I/O failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Key not found in the cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::FetchFailed(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            CacheError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::EntryTooLarge { .. }
            | CacheError::CorruptEntry(_)
            | CacheError::Storage(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the image cache.
pub type Result<T> = std::result::Result<T, CacheError>;
