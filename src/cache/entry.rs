//! Cache Entry Module
//!
//! Defines durable entries and their access metadata.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cache::BlobHandle;

// == Entry Metadata ==
/// Everything about a durable entry except its bytes.
///
/// Listings and eviction sweeps operate on this type so they never have to
/// load blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// The cache key (canonical source URL)
    pub key: String,
    /// MIME type reported by the fetcher
    pub content_type: String,
    /// Blob length in bytes
    pub size: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last read or write (Unix milliseconds)
    pub last_accessed: u64,
    /// Number of reads plus the initial write
    pub access_count: u64,
}

impl EntryMeta {
    // == Constructor ==
    /// Creates metadata for a freshly written blob.
    pub fn new(key: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        let now = next_timestamp_ms();
        Self {
            key: key.into(),
            content_type: content_type.into(),
            size,
            created_at: now,
            last_accessed: now,
            access_count: 1,
        }
    }

    // == Touch ==
    /// Records a read.
    pub fn touch(&mut self) {
        self.last_accessed = next_timestamp_ms();
        self.access_count += 1;
    }

    // == Is Expired ==
    /// Checks whether the entry is older than `max_age`.
    ///
    /// With no max age configured, entries never expire.
    pub fn is_expired(&self, max_age: Option<Duration>) -> bool {
        is_older_than(self.created_at, max_age)
    }

    /// Milliseconds since creation.
    pub fn age_ms(&self) -> u64 {
        current_timestamp_ms().saturating_sub(self.created_at)
    }
}

// == Entry ==
/// A durable entry: metadata plus the canonical copy of the bytes.
#[derive(Debug, Clone)]
pub struct Entry {
    pub meta: EntryMeta,
    pub blob: Bytes,
}

impl Entry {
    /// Creates a fresh entry; `size` always mirrors `blob.len()`.
    pub fn new(key: impl Into<String>, blob: Bytes, content_type: impl Into<String>) -> Self {
        let meta = EntryMeta::new(key, content_type, blob.len() as u64);
        Self { meta, blob }
    }

    pub fn key(&self) -> &str {
        &self.meta.key
    }

    pub fn size(&self) -> u64 {
        self.meta.size
    }

    /// Creates a counted view over the entry's bytes.
    pub fn handle(&self) -> BlobHandle {
        BlobHandle::new(&self.meta.key, self.blob.clone(), &self.meta.content_type)
    }
}

// == Utility Functions ==
static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Checks whether something created at `created_at` is older than `max_age`.
pub(crate) fn is_older_than(created_at: u64, max_age: Option<Duration>) -> bool {
    match max_age {
        Some(max_age) => {
            current_timestamp_ms().saturating_sub(created_at) > max_age.as_millis() as u64
        }
        None => false,
    }
}

/// Returns a Unix millisecond timestamp that is strictly greater than every
/// value previously returned in this process.
///
/// Recency ordering relies on these being unique.
pub fn next_timestamp_ms() -> u64 {
    let now = current_timestamp_ms();
    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}
