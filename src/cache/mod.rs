//! Cache Module
//!
//! Two-tier blob cache: a byte-budgeted LRU memory tier over a bounded
//! durable store, with per-key fetch deduplication.

mod entry;
mod file_store;
mod handle;
mod manager;
mod memory;
mod stats;
mod store;
mod tracker;


// Re-export public types
pub use entry::{current_timestamp_ms, Entry, EntryMeta};
pub use file_store::FileStore;
pub use handle::BlobHandle;
pub use manager::CacheManager;
pub use memory::{MemoryCache, MemoryEntry};
pub use stats::CacheStats;
pub use store::{DurableStore, InMemoryStore};
pub use tracker::RequestTracker;

// == Public Constants ==
/// Fraction of each durable limit an eviction sweep shrinks down to
pub const SWEEP_TARGET_RATIO: f64 = 0.8;

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 2048;
