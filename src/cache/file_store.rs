//! File Store Module
//!
//! Durable store keeping one blob file and one JSON metadata sidecar per key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cache::{DurableStore, Entry, EntryMeta};
use crate::error::{CacheError, Result};

const BLOB_EXT: &str = "bin";
const META_EXT: &str = "json";

// == File Store ==
/// A durable store rooted in a directory.
///
/// File names are the hex SHA-256 of the key, so arbitrary URLs map to safe,
/// fixed-length names. The sidecar records the original key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_stem(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::file_stem(key), BLOB_EXT))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::file_stem(key), META_EXT))
    }

    async fn read_meta(&self, key: &str) -> Result<Option<EntryMeta>> {
        let raw = match fs::read(self.meta_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let meta: EntryMeta = serde_json::from_slice(&raw)
            .map_err(|e| CacheError::CorruptEntry(format!("{}: {}", key, e)))?;

        if meta.key != key {
            return Err(CacheError::CorruptEntry(format!(
                "{}: metadata belongs to {}",
                key, meta.key
            )));
        }
        Ok(Some(meta))
    }

    async fn write_meta(&self, meta: &EntryMeta) -> Result<()> {
        let json = serde_json::to_vec(meta)
            .map_err(|e| CacheError::Internal(format!("encode metadata: {}", e)))?;
        let path = self.meta_path(&meta.key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            CacheError::StoreUnavailable(format!("{}: {}", self.root.display(), e))
        })?;

        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            CacheError::StoreUnavailable(format!("{}: {}", self.root.display(), e))
        })?;
        if metadata.permissions().readonly() {
            return Err(CacheError::StoreUnavailable(format!(
                "{} is read-only",
                self.root.display()
            )));
        }

        info!(root = %self.root.display(), "File store ready");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Entry>> {
        let Some(mut meta) = self.read_meta(key).await? else {
            return Ok(None);
        };

        let blob = match fs::read(self.blob_path(key)).await {
            Ok(blob) => Bytes::from(blob),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::CorruptEntry(format!("{}: blob file missing", key)));
            }
            Err(e) => return Err(e.into()),
        };

        if blob.len() as u64 != meta.size {
            return Err(CacheError::CorruptEntry(format!(
                "{}: expected {} bytes, found {}",
                key,
                meta.size,
                blob.len()
            )));
        }

        meta.touch();
        self.write_meta(&meta).await?;
        Ok(Some(Entry { meta, blob }))
    }

    async fn peek(&self, key: &str) -> Result<Option<EntryMeta>> {
        self.read_meta(key).await
    }

    async fn put(&self, key: &str, blob: Bytes, content_type: &str) -> Result<Entry> {
        let entry = Entry::new(key, blob, content_type);
        fs::write(self.blob_path(key), &entry.blob).await?;
        self.write_meta(&entry.meta).await?;
        debug!(key, size = entry.meta.size, "Wrote blob to file store");
        Ok(entry)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let had_meta = remove_if_exists(&self.meta_path(key)).await?;
        let had_blob = remove_if_exists(&self.blob_path(key)).await?;
        Ok(had_meta || had_blob)
    }

    async fn list_all(&self) -> Result<Vec<EntryMeta>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }

            let parsed = fs::read(&path)
                .await
                .ok()
                .and_then(|raw| serde_json::from_slice::<EntryMeta>(&raw).ok());
            match parsed {
                Some(meta) => entries.push(meta),
                None => {
                    warn!(path = %path.display(), "Removing unreadable metadata file");
                    remove_if_exists(&path).await?;
                    remove_if_exists(&path.with_extension(BLOB_EXT)).await?;
                }
            }
        }

        Ok(entries)
    }

    async fn clear(&self) -> Result<()> {
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let ours = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some(BLOB_EXT) | Some(META_EXT) | Some("tmp")
            );
            if ours {
                remove_if_exists(&path).await?;
            }
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn ready_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("blobs"));
        store.init().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (dir, store) = ready_store().await;
        store.init().await.unwrap();
        assert!(dir.path().join("blobs").is_dir());
    }

    #[tokio::test]
    async fn test_init_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let store = FileStore::new(&file);
        let result = store.init().await;

        assert!(matches!(result, Err(CacheError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_bytes() {
        let (_dir, store) = ready_store().await;
        let blob = Bytes::from((0u8..=255).collect::<Vec<_>>());

        store
            .put("https://cdn.example/emoji/1.webp", blob.clone(), "image/webp")
            .await
            .unwrap();
        let entry = store
            .get("https://cdn.example/emoji/1.webp")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.blob, blob);
        assert_eq!(entry.meta.content_type, "image/webp");
        assert_eq!(entry.meta.access_count, 2);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (_dir, store) = ready_store().await;
        assert!(store.get("https://nowhere/x.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_reported() {
        let (_dir, store) = ready_store().await;
        store.put("k", Bytes::from_static(b"abc"), "image/png").await.unwrap();
        std::fs::write(store.meta_path("k"), b"{not json").unwrap();

        let result = store.get("k").await;
        assert!(matches!(result, Err(CacheError::CorruptEntry(_))));
    }

    #[tokio::test]
    async fn test_truncated_blob_is_reported() {
        let (_dir, store) = ready_store().await;
        store.put("k", Bytes::from_static(b"abcdef"), "image/png").await.unwrap();
        std::fs::write(store.blob_path("k"), b"abc").unwrap();

        let result = store.get("k").await;
        assert!(matches!(result, Err(CacheError::CorruptEntry(_))));
    }

    #[tokio::test]
    async fn test_list_all_and_usage() {
        let (_dir, store) = ready_store().await;
        store.put("a", Bytes::from_static(b"12"), "image/png").await.unwrap();
        store.put("b", Bytes::from_static(b"345"), "image/png").await.unwrap();

        let mut keys: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.key)
            .collect();
        keys.sort();

        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.usage().await.unwrap(), (2, 5));
    }

    #[tokio::test]
    async fn test_list_all_purges_unreadable_sidecars() {
        let (_dir, store) = ready_store().await;
        store.put("good", Bytes::from_static(b"1"), "image/png").await.unwrap();
        store.put("bad", Bytes::from_static(b"2"), "image/png").await.unwrap();
        std::fs::write(store.meta_path("bad"), b"garbage").unwrap();

        let listed = store.list_all().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert!(!store.blob_path("bad").exists());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (_dir, store) = ready_store().await;
        store.put("a", Bytes::from_static(b"1"), "image/png").await.unwrap();
        store.put("b", Bytes::from_static(b"2"), "image/png").await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.peek("a").await.unwrap().is_none());

        store.clear().await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
