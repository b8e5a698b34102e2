//! Durable Store Module
//!
//! The pluggable L2 backend contract and a process-local implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::{Entry, EntryMeta};
use crate::error::{CacheError, Result};

// == Durable Store ==
/// A persistent key -> blob map.
///
/// Implementations only store; capacity enforcement is driven by the cache
/// manager, which serializes every call it makes on one store.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Prepares the backend. Calling it again after success is a no-op.
    async fn init(&self) -> Result<()>;

    /// Reads an entry, recording the access on the stored metadata.
    ///
    /// A stored entry that cannot be decoded yields `CacheError::CorruptEntry`.
    async fn get(&self, key: &str) -> Result<Option<Entry>>;

    /// Reads metadata without recording an access.
    async fn peek(&self, key: &str) -> Result<Option<EntryMeta>>;

    /// Stores a fresh entry, fully replacing any previous one for `key`.
    async fn put(&self, key: &str, blob: Bytes, content_type: &str) -> Result<Entry>;

    /// Removes an entry. Returns whether one existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Lists metadata for every readable entry.
    async fn list_all(&self) -> Result<Vec<EntryMeta>>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;

    /// Returns `(entry count, total bytes)`.
    async fn usage(&self) -> Result<(usize, u64)> {
        let entries = self.list_all().await?;
        let total = entries.iter().map(|e| e.size).sum();
        Ok((entries.len(), total))
    }
}

// == In-Memory Store ==
/// A durable-store implementation that lives in process memory.
///
/// Used when no cache directory is configured and throughout the tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Internal("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Entry>> {
        let mut entries = self.lock()?;
        Ok(entries.get_mut(key).map(|entry| {
            entry.meta.touch();
            entry.clone()
        }))
    }

    async fn peek(&self, key: &str) -> Result<Option<EntryMeta>> {
        Ok(self.lock()?.get(key).map(|entry| entry.meta.clone()))
    }

    async fn put(&self, key: &str, blob: Bytes, content_type: &str) -> Result<Entry> {
        let entry = Entry::new(key, blob, content_type);
        self.lock()?.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn list_all(&self) -> Result<Vec<EntryMeta>> {
        Ok(self.lock()?.values().map(|e| e.meta.clone()).collect())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn usage(&self) -> Result<(usize, u64)> {
        let entries = self.lock()?;
        let total = entries.values().map(|e| e.meta.size).sum();
        Ok((entries.len(), total))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let store = InMemoryStore::new();
        store.init().await.unwrap();

        let blob = Bytes::from_static(b"\x89PNG\r\n\x1a\n");
        store.put("https://a/1.png", blob.clone(), "image/png").await.unwrap();

        let entry = store.get("https://a/1.png").await.unwrap().unwrap();
        assert_eq!(entry.blob, blob);
        assert_eq!(entry.meta.size, blob.len() as u64);
        assert_eq!(entry.meta.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_get_records_access() {
        let store = InMemoryStore::new();
        let written = store.put("k", Bytes::from_static(b"x"), "image/png").await.unwrap();

        store.get("k").await.unwrap();
        let read = store.get("k").await.unwrap().unwrap();

        assert_eq!(read.meta.access_count, 3);
        assert!(read.meta.last_accessed > written.meta.last_accessed);
    }

    #[tokio::test]
    async fn test_peek_does_not_record_access() {
        let store = InMemoryStore::new();
        store.put("k", Bytes::from_static(b"x"), "image/png").await.unwrap();

        store.peek("k").await.unwrap();
        let meta = store.peek("k").await.unwrap().unwrap();

        assert_eq!(meta.access_count, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_fully() {
        let store = InMemoryStore::new();
        let first = store.put("k", Bytes::from_static(b"old"), "image/png").await.unwrap();
        store.get("k").await.unwrap();

        store.put("k", Bytes::from_static(b"newer"), "image/gif").await.unwrap();
        let meta = store.peek("k").await.unwrap().unwrap();

        assert_eq!(meta.access_count, 1);
        assert_eq!(meta.size, 5);
        assert_eq!(meta.content_type, "image/gif");
        assert!(meta.created_at > first.meta.created_at);
        assert_eq!(store.usage().await.unwrap(), (1, 5));
    }

    #[tokio::test]
    async fn test_delete_list_clear() {
        let store = InMemoryStore::new();
        store.put("a", Bytes::from_static(b"12"), "image/png").await.unwrap();
        store.put("b", Bytes::from_static(b"345"), "image/png").await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "b");

        store.clear().await.unwrap();
        assert_eq!(store.usage().await.unwrap(), (0, 0));
    }
}
