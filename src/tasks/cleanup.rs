//! Expiry Task
//!
//! Background task that periodically purges entries older than the
//! configured maximum age.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;

/// Spawns a background task that periodically purges expired cache entries.
///
/// The task sleeps for `interval_secs` between runs. Purge failures are
/// logged and the loop keeps going.
///
/// Returns a JoinHandle that can be aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let expiry_handle = spawn_expiry_task(cache.clone(), 60);
/// // Later, during shutdown:
/// expiry_handle.abort();
/// ```
pub fn spawn_expiry_task(cache: CacheManager, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.purge_expired().await {
                Ok(0) => debug!("Expiry sweep: no expired entries found"),
                Ok(removed) => info!("Expiry sweep: removed {} expired entries", removed),
                Err(e) => warn!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryStore;
    use crate::config::CacheConfig;
    use crate::error::Result;
    use crate::fetcher::{BlobFetcher, FetchedBlob};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;

    struct TinyFetcher;

    #[async_trait]
    impl BlobFetcher for TinyFetcher {
        async fn fetch(&self, _key: &str) -> Result<FetchedBlob> {
            Ok(FetchedBlob {
                bytes: Bytes::from_static(b"png"),
                content_type: "image/png".to_string(),
            })
        }
    }

    async fn manager(max_age: Option<Duration>) -> CacheManager {
        let config = CacheConfig {
            entry_max_age: max_age,
            ..CacheConfig::default()
        };
        CacheManager::new(config, Arc::new(InMemoryStore::new()), Arc::new(TinyFetcher)).await
    }

    #[tokio::test]
    async fn test_expiry_task_removes_expired_entries() {
        let cache = manager(Some(Duration::from_millis(200))).await;
        cache.get_or_fetch("https://a/old.png").await.unwrap();

        let handle = spawn_expiry_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(
            !cache.is_cached("https://a/old.png").await,
            "Expired entry should have been purged"
        );
        assert_eq!(cache.stats().await.l2_entries, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_expiry_task_preserves_fresh_entries() {
        let cache = manager(Some(Duration::from_secs(3600))).await;
        cache.get_or_fetch("https://a/fresh.png").await.unwrap();

        let handle = spawn_expiry_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.is_cached("https://a/fresh.png").await);

        handle.abort();
    }

    #[tokio::test]
    async fn test_expiry_task_can_be_aborted() {
        let cache = manager(None).await;

        let handle = spawn_expiry_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
