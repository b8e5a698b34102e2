//! Request and Response models for the image cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{CacheManyRequest, CleanupRequest, PreloadRequest, UrlQuery};
pub use responses::{
    BatchItem, BatchResponse, CachedResponse, CleanupResponse, ErrorResponse, HealthResponse,
    MessageResponse, PreloadResponse, StatsResponse,
};
