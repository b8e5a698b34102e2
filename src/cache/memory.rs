//! Memory Cache Module
//!
//! Byte-budgeted LRU map of blob handles (the L1 tier).

use std::time::Duration;

use lru::LruCache;
use tracing::{debug, trace};

use crate::cache::entry::{is_older_than, next_timestamp_ms};
use crate::cache::BlobHandle;

// == Memory Entry ==
/// A live handle plus its access metadata.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub handle: BlobHandle,
    pub size: u64,
    /// Creation time of the blob this handle views (Unix milliseconds)
    pub created_at: u64,
    pub last_accessed: u64,
    pub access_count: u64,
}

impl MemoryEntry {
    /// Checks whether the viewed blob is older than `max_age`.
    pub fn is_expired(&self, max_age: Option<Duration>) -> bool {
        is_older_than(self.created_at, max_age)
    }
}

// == Memory Cache ==
/// L1 cache holding counted views over durable blobs.
///
/// Never owns the canonical bytes; evicting an entry only drops this tier's
/// view of them. Bounded by bytes rather than entry count, so the underlying
/// `LruCache` is unbounded and eviction is driven from `set`.
pub struct MemoryCache {
    entries: LruCache<String, MemoryEntry>,
    current_size: u64,
    budget: u64,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates an empty cache with the given byte budget.
    pub fn new(budget: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            current_size: 0,
            budget,
        }
    }

    // == Get ==
    /// Returns a handle for `key`, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Option<BlobHandle> {
        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = next_timestamp_ms();
        entry.access_count += 1;
        Some(entry.handle.clone())
    }

    /// Checks presence without touching recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Returns the entry for `key` without touching recency.
    pub fn peek(&self, key: &str) -> Option<&MemoryEntry> {
        self.entries.peek(key)
    }

    // == Set ==
    /// Inserts `handle` under `key`, evicting least recently used entries
    /// until it fits.
    ///
    /// Any previous handle for `key` is released first. A handle larger than
    /// the whole budget is not inserted. Returns the number of entries evicted
    /// to make room.
    pub fn set(&mut self, key: &str, handle: BlobHandle, size: u64, created_at: u64) -> usize {
        self.delete(key);

        if size > self.budget {
            debug!(
                key,
                size,
                budget = self.budget,
                "Blob exceeds memory budget, skipping memory tier"
            );
            return 0;
        }

        let mut evicted = 0;
        while self.current_size + size > self.budget {
            let Some((oldest, entry)) = self.entries.pop_lru() else {
                break;
            };
            self.current_size -= entry.size;
            evicted += 1;
            trace!(key = %oldest, size = entry.size, "Evicted from memory tier");
        }

        self.entries.put(
            key.to_string(),
            MemoryEntry {
                handle,
                size,
                created_at,
                last_accessed: next_timestamp_ms(),
                access_count: 1,
            },
        );
        self.current_size += size;

        evicted
    }

    // == Delete ==
    /// Removes and releases the handle for `key`.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.current_size -= entry.size;
                true
            }
            None => false,
        }
    }

    /// Removes every entry older than `max_age`, returning how many went.
    pub fn remove_expired(&mut self, max_age: Option<Duration>) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(max_age))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.delete(key);
        }
        expired.len()
    }

    // == Clear ==
    /// Releases every handle.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes currently accounted to this tier.
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }
}
