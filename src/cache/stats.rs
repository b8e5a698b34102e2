//! Cache Statistics Module
//!
//! Tier occupancy plus hit, miss and eviction counters.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of both tiers and the manager's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries in the memory tier
    pub l1_entries: usize,
    /// Bytes held by the memory tier
    pub l1_bytes: u64,
    pub l1_budget_bytes: u64,
    /// Entries in the durable tier
    pub l2_entries: usize,
    /// Bytes held by the durable tier
    pub l2_bytes: u64,
    pub l2_budget_bytes: u64,
    /// Creation time of the oldest durable entry (Unix milliseconds)
    pub oldest_entry_timestamp: Option<u64>,
    /// Creation time of the newest durable entry (Unix milliseconds)
    pub newest_entry_timestamp: Option<u64>,
    /// Lookups served from either tier
    pub hits: u64,
    /// Lookups that required a fetch
    pub misses: u64,
    /// Entries removed by budget enforcement, sweeps or cleanup
    pub evictions: u64,
    /// Fetches that ended in an error
    pub fetch_failures: u64,
    /// False when the durable store could not be initialized
    pub caching_enabled: bool,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_fetch_failure(&mut self) {
        self.fetch_failures += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.l2_entries, 0);
        assert!(stats.oldest_entry_timestamp.is_none());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_record_evictions_accumulates() {
        let mut stats = CacheStats::new();
        stats.record_evictions(2);
        stats.record_evictions(0);
        stats.record_evictions(3);
        assert_eq!(stats.evictions, 5);
    }

    #[test]
    fn test_record_fetch_failure() {
        let mut stats = CacheStats::new();
        stats.record_fetch_failure();
        assert_eq!(stats.fetch_failures, 1);
    }
}
