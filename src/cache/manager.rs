//! Cache Manager Module
//!
//! Composes the memory tier, the durable store, the fetcher and the request
//! tracker into the public get-or-fetch API.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{
    current_timestamp_ms, BlobHandle, CacheStats, DurableStore, Entry, EntryMeta, MemoryCache, RequestTracker,
    SWEEP_TARGET_RATIO,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::fetcher::BlobFetcher;

/// State guarded by the manager's single lock.
struct Tiers {
    memory: MemoryCache,
    stats: CacheStats,
}

struct Inner {
    config: CacheConfig,
    /// None when the store failed to initialize (pass-through mode)
    store: Option<Arc<dyn DurableStore>>,
    fetcher: Arc<dyn BlobFetcher>,
    tiers: Mutex<Tiers>,
    tracker: RequestTracker<BlobHandle>,
}

// == Cache Manager ==
/// Two-tier cache in front of a [`BlobFetcher`].
///
/// Cloning is cheap and every clone shares the same tiers. All memory-tier
/// and durable-store mutations of one manager are serialized by one lock;
/// fetches run outside it, deduplicated per key.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl CacheManager {
    // == Constructor ==
    /// Builds a manager and initializes `store`.
    ///
    /// If initialization fails the manager runs in pass-through mode: every
    /// lookup goes to the fetcher and nothing is cached.
    pub async fn new(
        config: CacheConfig,
        store: Arc<dyn DurableStore>,
        fetcher: Arc<dyn BlobFetcher>,
    ) -> Self {
        let store = match store.init().await {
            Ok(()) => Some(store),
            Err(e) => {
                warn!(error = %e, "Durable store unavailable, caching disabled");
                None
            }
        };

        let mut stats = CacheStats::new();
        stats.caching_enabled = store.is_some();

        Self {
            inner: Arc::new(Inner {
                tiers: Mutex::new(Tiers {
                    memory: MemoryCache::new(config.memory_budget_bytes),
                    stats,
                }),
                config,
                store,
                fetcher,
                tracker: RequestTracker::new(),
            }),
        }
    }

    /// False when running in pass-through mode.
    pub fn caching_enabled(&self) -> bool {
        self.inner.store.is_some()
    }

    // == Is Cached ==
    /// Checks either tier without touching recency. Expired entries count
    /// as absent.
    pub async fn is_cached(&self, key: &str) -> bool {
        let tiers = self.inner.tiers.lock().await;
        if self.inner.fresh_in_memory(&tiers, key) {
            return true;
        }

        let Some(store) = &self.inner.store else {
            return false;
        };
        match store.peek(key).await {
            Ok(Some(meta)) => !meta.is_expired(self.inner.config.entry_max_age),
            Ok(None) => false,
            Err(e) => {
                debug!(key, error = %e, "Durable peek failed");
                false
            }
        }
    }

    // == Get Or Fetch ==
    /// Returns a handle for `key`, fetching it at most once across
    /// concurrent callers when neither tier has it.
    ///
    /// A fetch error reaches every caller waiting on that key and leaves both
    /// tiers untouched.
    pub async fn get_or_fetch(&self, key: &str) -> Result<BlobHandle> {
        if let Some(handle) = self.inner.lookup(key).await {
            return Ok(handle);
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        self.inner
            .tracker
            .track(key, move || async move { inner.fetch_and_store(&owned_key).await })
            .await
    }

    // == Cache Many ==
    /// Fetches `keys` in chunks of `concurrency`, awaiting each chunk before
    /// starting the next.
    ///
    /// `on_progress(completed, total)` runs after every individual
    /// completion, successful or not.
    pub async fn cache_many<F>(
        &self,
        keys: &[String],
        concurrency: usize,
        mut on_progress: F,
    ) -> HashMap<String, Result<BlobHandle>>
    where
        F: FnMut(usize, usize),
    {
        let total = keys.len();
        let chunk_size = concurrency.max(1);
        let mut results = HashMap::with_capacity(total);
        let mut completed = 0;

        for chunk in keys.chunks(chunk_size) {
            let mut pending: FuturesUnordered<_> = chunk
                .iter()
                .map(|key| async move { (key.clone(), self.get_or_fetch(key).await) })
                .collect();

            while let Some((key, outcome)) = pending.next().await {
                completed += 1;
                on_progress(completed, total);
                results.insert(key, outcome);
            }
        }

        let failed = results.values().filter(|r| r.is_err()).count();
        info!(total, failed, "Batch caching finished");
        results
    }

    // == Preload To Memory ==
    /// Promotes durable-only keys into the memory tier without fetching.
    ///
    /// Returns how many keys were promoted; keys already in memory or absent
    /// from the durable tier are not counted.
    pub async fn preload_to_memory(&self, keys: &[String]) -> usize {
        let Some(store) = &self.inner.store else {
            return 0;
        };

        let mut tiers = self.inner.tiers.lock().await;
        let mut promoted = 0;

        for key in keys {
            if self.inner.fresh_in_memory(&tiers, key) {
                continue;
            }
            if let Some(entry) = self.inner.read_durable(store, &mut tiers, key).await {
                self.inner.promote(&mut tiers, &entry);
                if tiers.memory.contains(key) {
                    promoted += 1;
                }
            }
        }

        debug!(requested = keys.len(), promoted, "Preloaded into memory");
        promoted
    }

    // == Cleanup LRU ==
    /// Removes the least recently used `target_fraction` of durable entries
    /// and their memory mirrors.
    pub async fn cleanup_lru(&self, target_fraction: f64) -> Result<usize> {
        if !(0.0..=1.0).contains(&target_fraction) {
            return Err(CacheError::InvalidRequest(format!(
                "fraction must be between 0 and 1, got {}",
                target_fraction
            )));
        }
        let Some(store) = &self.inner.store else {
            return Ok(0);
        };

        let mut tiers = self.inner.tiers.lock().await;
        let mut entries = store.list_all().await?;
        entries.sort_by_key(|meta| meta.last_accessed);

        let quota = (entries.len() as f64 * target_fraction).floor() as usize;
        let mut removed = 0;
        for meta in entries.iter().take(quota) {
            match store.delete(&meta.key).await {
                Ok(_) => {
                    tiers.memory.delete(&meta.key);
                    removed += 1;
                }
                Err(e) => warn!(key = %meta.key, error = %e, "Failed to remove entry"),
            }
        }

        tiers.stats.record_evictions(removed);
        info!(removed, target_fraction, "LRU cleanup finished");
        Ok(removed)
    }

    // == Purge Expired ==
    /// Removes every entry older than `entry_max_age` from both tiers.
    pub async fn purge_expired(&self) -> Result<usize> {
        let (Some(store), Some(max_age)) = (&self.inner.store, self.inner.config.entry_max_age)
        else {
            return Ok(0);
        };

        let mut tiers = self.inner.tiers.lock().await;
        let mut removed = 0;
        for meta in store.list_all().await? {
            if meta.is_expired(Some(max_age)) {
                store.delete(&meta.key).await?;
                tiers.memory.delete(&meta.key);
                removed += 1;
            }
        }
        // Memory-only entries, such as blobs too large for the durable tier.
        removed += tiers.memory.remove_expired(Some(max_age));
        Ok(removed)
    }

    // == Delete ==
    /// Removes `key` from both tiers. Returns whether either tier held it.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut tiers = self.inner.tiers.lock().await;
        let in_memory = tiers.memory.delete(key);
        let durable = match &self.inner.store {
            Some(store) => store.delete(key).await?,
            None => false,
        };
        Ok(in_memory || durable)
    }

    // == Clear All ==
    /// Empties both tiers.
    pub async fn clear_all(&self) -> Result<()> {
        let mut tiers = self.inner.tiers.lock().await;
        tiers.memory.clear();
        if let Some(store) = &self.inner.store {
            store.clear().await?;
        }
        info!("Cache cleared");
        Ok(())
    }

    // == Stats ==
    /// Returns a snapshot of both tiers and the counters.
    pub async fn stats(&self) -> CacheStats {
        let tiers = self.inner.tiers.lock().await;
        let mut stats = tiers.stats.clone();
        stats.l1_entries = tiers.memory.len();
        stats.l1_bytes = tiers.memory.current_size();
        stats.l1_budget_bytes = tiers.memory.budget();
        stats.l2_budget_bytes = self.inner.config.persistent_budget_bytes;

        if let Some(store) = &self.inner.store {
            match store.list_all().await {
                Ok(entries) => {
                    stats.l2_entries = entries.len();
                    stats.l2_bytes = entries.iter().map(|e| e.size).sum();
                    stats.oldest_entry_timestamp = entries.iter().map(|e| e.created_at).min();
                    stats.newest_entry_timestamp = entries.iter().map(|e| e.created_at).max();
                }
                Err(e) => warn!(error = %e, "Failed to list durable entries for stats"),
            }
        }

        stats
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.in_flight()
    }
}

impl Inner {
    fn fresh_in_memory(&self, tiers: &Tiers, key: &str) -> bool {
        tiers
            .memory
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(self.config.entry_max_age))
    }

    /// Serves `key` from memory, or promotes it from the durable tier.
    ///
    /// An expired memory entry is purged from both tiers and reported as a
    /// miss.
    async fn lookup(&self, key: &str) -> Option<BlobHandle> {
        let mut tiers = self.tiers.lock().await;

        let expired = tiers
            .memory
            .peek(key)
            .map(|entry| entry.is_expired(self.config.entry_max_age));
        match expired {
            Some(true) => {
                debug!(key, "Memory entry expired");
                tiers.memory.delete(key);
                if let Some(store) = &self.store {
                    self.purge(store, &mut tiers, key).await;
                }
                return None;
            }
            Some(false) => {
                if let Some(handle) = tiers.memory.get(key) {
                    tiers.stats.record_hit();
                    debug!(key, "Memory hit");
                    return Some(handle);
                }
            }
            None => {}
        }

        let store = self.store.as_ref()?;
        let entry = self.read_durable(store, &mut tiers, key).await?;
        let handle = self.promote(&mut tiers, &entry);
        tiers.stats.record_hit();
        debug!(key, "Durable hit, promoted to memory");
        Some(handle)
    }

    /// Reads a durable entry, purging it when corrupt or expired.
    async fn read_durable(
        &self,
        store: &Arc<dyn DurableStore>,
        tiers: &mut Tiers,
        key: &str,
    ) -> Option<Entry> {
        match store.get(key).await {
            Ok(Some(entry)) if entry.meta.is_expired(self.config.entry_max_age) => {
                debug!(key, age_ms = entry.meta.age_ms(), "Durable entry expired");
                self.purge(store, tiers, key).await;
                None
            }
            Ok(found) => found,
            Err(CacheError::CorruptEntry(reason)) => {
                warn!(key, reason = %reason, "Purging corrupt durable entry");
                self.purge(store, tiers, key).await;
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Durable read failed, treating as miss");
                None
            }
        }
    }

    async fn purge(&self, store: &Arc<dyn DurableStore>, tiers: &mut Tiers, key: &str) {
        tiers.memory.delete(key);
        if let Err(e) = store.delete(key).await {
            warn!(key, error = %e, "Failed to purge durable entry");
        }
    }

    /// Mirrors a durable entry into the memory tier.
    fn promote(&self, tiers: &mut Tiers, entry: &Entry) -> BlobHandle {
        let handle = entry.handle();
        let evicted = tiers.memory.set(
            entry.key(),
            handle.clone(),
            entry.size(),
            entry.meta.created_at,
        );
        tiers.stats.record_evictions(evicted);
        handle
    }

    /// Body of a tracked miss: fetch, write to the durable tier, sweep,
    /// then mirror into memory.
    async fn fetch_and_store(&self, key: &str) -> Result<BlobHandle> {
        // A previous run may have stored the key between our miss and now.
        if let Some(handle) = self.lookup(key).await {
            return Ok(handle);
        }

        self.tiers.lock().await.stats.record_miss();

        let fetched = match self.fetcher.fetch(key).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.tiers.lock().await.stats.record_fetch_failure();
                warn!(key, error = %e, "Fetch failed");
                return Err(e);
            }
        };

        let Some(store) = &self.store else {
            return Ok(BlobHandle::new(key, fetched.bytes, &fetched.content_type));
        };

        let mut tiers = self.tiers.lock().await;
        let size = fetched.bytes.len() as u64;

        if size > self.config.persistent_budget_bytes {
            let skipped = CacheError::EntryTooLarge {
                key: key.to_string(),
                size,
                budget: self.config.persistent_budget_bytes,
            };
            debug!(reason = %skipped, "Skipping durable tier");
            let handle = BlobHandle::new(key, fetched.bytes, &fetched.content_type);
            let evicted = tiers
                .memory
                .set(key, handle.clone(), size, current_timestamp_ms());
            tiers.stats.record_evictions(evicted);
            return Ok(handle);
        }

        let entry = match store
            .put(key, fetched.bytes.clone(), &fetched.content_type)
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Durable write failed, serving uncached");
                return Ok(BlobHandle::new(key, fetched.bytes, &fetched.content_type));
            }
        };

        let swept = self.enforce_limits(store, &mut tiers).await;
        if swept.iter().any(|k| k == key) {
            return Ok(entry.handle());
        }

        info!(key, size, "Cached blob");
        Ok(self.promote(&mut tiers, &entry))
    }

    /// Runs the eviction sweep when the durable tier is over either limit.
    ///
    /// Removes entries in LRU order (expired ones first) until both the
    /// count and the byte total are at or under the sweep target. Returns the
    /// removed keys.
    async fn enforce_limits(&self, store: &Arc<dyn DurableStore>, tiers: &mut Tiers) -> Vec<String> {
        let max_entries = self.config.max_entries;
        let max_bytes = self.config.persistent_budget_bytes;

        match store.usage().await {
            Ok((count, total)) if count <= max_entries && total <= max_bytes => return Vec::new(),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Could not measure durable usage");
                return Vec::new();
            }
        }

        let mut entries = match store.list_all().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not list durable entries for sweep");
                return Vec::new();
            }
        };

        let max_age = self.config.entry_max_age;
        entries.sort_by_key(|meta: &EntryMeta| (Reverse(meta.is_expired(max_age)), meta.last_accessed));

        let target_count = (max_entries as f64 * SWEEP_TARGET_RATIO).floor() as usize;
        let target_bytes = (max_bytes as f64 * SWEEP_TARGET_RATIO).floor() as u64;
        let mut count = entries.len();
        let mut total: u64 = entries.iter().map(|e| e.size).sum();
        let mut removed = Vec::new();

        for meta in entries {
            if count <= target_count && total <= target_bytes {
                break;
            }
            match store.delete(&meta.key).await {
                Ok(_) => {
                    tiers.memory.delete(&meta.key);
                    count -= 1;
                    total -= meta.size;
                    removed.push(meta.key);
                }
                Err(e) => warn!(key = %meta.key, error = %e, "Failed to evict entry"),
            }
        }

        tiers.stats.record_evictions(removed.len());
        info!(
            removed = removed.len(),
            remaining = count,
            bytes = total,
            "Eviction sweep finished"
        );
        removed
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryStore;
    use crate::fetcher::FetchedBlob;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct FixedFetcher;

    #[async_trait]
    impl BlobFetcher for FixedFetcher {
        async fn fetch(&self, key: &str) -> Result<FetchedBlob> {
            Ok(FetchedBlob {
                bytes: Bytes::from(key.as_bytes().to_vec()),
                content_type: "image/png".to_string(),
            })
        }
    }

    async fn manager(config: CacheConfig) -> (CacheManager, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let manager = CacheManager::new(config, store.clone(), Arc::new(FixedFetcher)).await;
        (manager, store)
    }

    #[tokio::test]
    async fn test_miss_then_memory_hit() {
        let (manager, _) = manager(CacheConfig::default()).await;

        let first = manager.get_or_fetch("https://a/1.png").await.unwrap();
        let second = manager.get_or_fetch("https://a/1.png").await.unwrap();

        assert_eq!(first.bytes(), second.bytes());
        let stats = manager.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.l1_entries, 1);
        assert_eq!(stats.l2_entries, 1);
    }

    #[tokio::test]
    async fn test_durable_hit_is_promoted() {
        let (manager, store) = manager(CacheConfig::default()).await;
        store
            .put("https://a/2.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        let handle = manager.get_or_fetch("https://a/2.png").await.unwrap();

        assert_eq!(handle.bytes().as_ref(), b"png");
        let stats = manager.stats().await;
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.l1_entries, 1);
    }

    #[tokio::test]
    async fn test_oversized_blob_skips_durable_tier() {
        let config = CacheConfig {
            persistent_budget_bytes: 4,
            ..CacheConfig::default()
        };
        let (manager, store) = manager(config).await;

        let handle = manager.get_or_fetch("https://big/image.png").await.unwrap();

        assert_eq!(handle.size(), "https://big/image.png".len() as u64);
        assert_eq!(store.usage().await.unwrap(), (0, 0));
        assert!(manager.is_cached("https://big/image.png").await);
    }

    #[tokio::test]
    async fn test_cleanup_rejects_bad_fraction() {
        let (manager, _) = manager(CacheConfig::default()).await;
        assert!(matches!(
            manager.cleanup_lru(1.5).await,
            Err(CacheError::InvalidRequest(_))
        ));
        assert!(manager.cleanup_lru(f64::NAN).await.is_err());
    }
}
