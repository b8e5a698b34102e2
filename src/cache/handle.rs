//! Blob Handle Module
//!
//! Opaque, reference-counted views over cached bytes.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

// == Blob Handle ==
/// A counted view over a blob owned by the durable tier.
///
/// Cloning a handle never copies the bytes. A handle stays readable after its
/// memory entry is evicted; the bytes are freed once the last holder drops it.
#[derive(Clone)]
pub struct BlobHandle {
    key: Arc<str>,
    bytes: Bytes,
    content_type: Arc<str>,
}

impl BlobHandle {
    pub fn new(key: &str, bytes: Bytes, content_type: &str) -> Self {
        Self {
            key: Arc::from(key),
            bytes,
            content_type: Arc::from(content_type),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Size of the viewed blob in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobHandle")
            .field("key", &self.key)
            .field("size", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_buffer() {
        let handle = BlobHandle::new("k", Bytes::from(vec![7u8; 32]), "image/png");
        let other = handle.clone();

        assert_eq!(other.bytes().as_ptr(), handle.bytes().as_ptr());
        assert_eq!(other.size(), 32);
        assert_eq!(other.key(), "k");
    }

    #[test]
    fn test_debug_omits_bytes() {
        let handle = BlobHandle::new("k", Bytes::from_static(b"secret"), "image/png");
        let debug = format!("{:?}", handle);
        assert!(debug.contains("size: 6"));
        assert!(!debug.contains("secret"));
    }
}
