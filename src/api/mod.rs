//! API Module
//!
//! HTTP handlers and routing for the image cache REST API.
//!
//! # Endpoints
//! - `GET /image?url=` - Serve a blob through the cache
//! - `GET /cached?url=` - Check whether a URL is cached
//! - `POST /cache`, `DELETE /cache` - Batch caching and clearing
//! - `DELETE /cache/entry?url=` - Remove one URL
//! - `POST /preload`, `POST /cleanup` - Tier maintenance
//! - `GET /stats`, `GET /health` - Monitoring

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
