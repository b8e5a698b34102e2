//! API Handlers
//!
//! HTTP request handlers for each image cache endpoint.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use crate::cache::CacheManager;
use crate::error::{CacheError, Result};
use crate::models::{
    BatchItem, BatchResponse, CacheManyRequest, CachedResponse, CleanupRequest, CleanupResponse,
    HealthResponse, MessageResponse, PreloadRequest, PreloadResponse, StatsResponse, UrlQuery,
};

/// Response header reporting whether a blob was served from the cache
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Application state shared across all handlers.
///
/// The cache manager is internally shared, so cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheManager,
}

impl AppState {
    /// Creates a new AppState around an already constructed cache manager.
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }
}

fn invalid(message: Option<String>) -> Result<()> {
    match message {
        Some(msg) => Err(CacheError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Handler for GET /image?url=
///
/// Serves the blob for `url`, fetching it on a miss.
pub async fn image_handler(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Response> {
    invalid(query.validate())?;

    let hit = state.cache.is_cached(&query.url).await;
    let handle = state.cache.get_or_fetch(&query.url).await?;

    let headers = [
        (header::CONTENT_TYPE, handle.content_type().to_string()),
        (X_CACHE, if hit { "HIT" } else { "MISS" }.to_string()),
    ];
    Ok((headers, Body::from(handle.bytes().clone())).into_response())
}

/// Handler for GET /cached?url=
pub async fn cached_handler(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<CachedResponse>> {
    invalid(query.validate())?;

    let cached = state.cache.is_cached(&query.url).await;
    Ok(Json(CachedResponse {
        url: query.url,
        cached,
    }))
}

/// Handler for POST /cache
///
/// Fetches and caches a batch of URLs, reporting each outcome.
pub async fn cache_many_handler(
    State(state): State<AppState>,
    Json(req): Json<CacheManyRequest>,
) -> Result<Json<BatchResponse>> {
    invalid(req.validate())?;

    let outcomes = state
        .cache
        .cache_many(&req.urls, req.concurrency(), |done, total| {
            debug!(done, total, "Batch progress");
        })
        .await;

    let results = req
        .urls
        .iter()
        .filter_map(|url| {
            outcomes
                .get(url)
                .map(|outcome| BatchItem::from_outcome(url, outcome))
        })
        .collect();

    Ok(Json(BatchResponse::new(results)))
}

/// Handler for POST /preload
///
/// Promotes durable entries into memory without fetching.
pub async fn preload_handler(
    State(state): State<AppState>,
    Json(req): Json<PreloadRequest>,
) -> Result<Json<PreloadResponse>> {
    invalid(req.validate())?;

    let promoted = state.cache.preload_to_memory(&req.urls).await;
    Ok(Json(PreloadResponse {
        requested: req.urls.len(),
        promoted,
    }))
}

/// Handler for POST /cleanup
pub async fn cleanup_handler(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>> {
    let removed = state.cache.cleanup_lru(req.fraction).await?;
    Ok(Json(CleanupResponse { removed }))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    state.cache.clear_all().await?;
    Ok(Json(MessageResponse::cleared()))
}

/// Handler for DELETE /cache/entry?url=
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<MessageResponse>> {
    invalid(query.validate())?;

    if !state.cache.delete(&query.url).await? {
        return Err(CacheError::NotFound(query.url));
    }
    Ok(Json(MessageResponse::deleted(query.url)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(state.cache.caching_enabled()))
}
