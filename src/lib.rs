//! Image Cache - A two-tier blob cache server
//!
//! Serves remote images through a byte-budgeted memory tier backed by a
//! bounded durable store, fetching each missing URL at most once across
//! concurrent requests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheManager;
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_expiry_task;
