//! API Routes
//!
//! Configures the Axum router with all image cache endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_many_handler, cached_handler, cleanup_handler, clear_handler, delete_entry_handler,
    health_handler, image_handler, preload_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /image?url=` - Serve a blob, fetching it on a miss
/// - `GET /cached?url=` - Report whether a URL is cached
/// - `POST /cache` - Fetch and cache a batch of URLs
/// - `DELETE /cache` - Clear both tiers
/// - `DELETE /cache/entry?url=` - Remove one URL
/// - `POST /preload` - Promote durable entries into memory
/// - `POST /cleanup` - Remove the least recently used fraction of entries
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/image", get(image_handler))
        .route("/cached", get(cached_handler))
        .route("/cache", post(cache_many_handler).delete(clear_handler))
        .route("/cache/entry", delete(delete_entry_handler))
        .route("/preload", post(preload_handler))
        .route("/cleanup", post(cleanup_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
