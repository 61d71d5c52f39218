//! In-memory object store for tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use depot_core::{Error, Result};

use crate::{content_disposition, Disposition, ObjectStore};

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    mime: String,
}

/// Object store backed by a process-local map. Presigned URLs are fake but
/// carry the same query parameters as the S3 backend so assertions hold.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a blob back, for assertions.
    pub async fn get(&self, locator: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(locator)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("blob {locator}")))
    }

    /// MIME type recorded at put time, for assertions.
    pub async fn mime_of(&self, locator: &str) -> Option<String> {
        self.blobs.read().await.get(locator).map(|b| b.mime.clone())
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, locator: &str, bytes: &[u8], mime: &str) -> Result<()> {
        self.blobs.write().await.insert(
            locator.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                mime: mime.to_string(),
            },
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        locator: &str,
        disposition: Disposition,
        filename: &str,
        ttl: Duration,
    ) -> Result<String> {
        if !self.blobs.read().await.contains_key(locator) {
            return Err(Error::NotFound(format!("blob {locator}")));
        }
        Ok(format!(
            "memory://{}?X-Amz-Expires={}&response-content-disposition={}",
            locator,
            ttl.as_secs(),
            content_disposition(disposition, filename)
        ))
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        self.blobs.write().await.remove(locator);
        Ok(())
    }

    async fn exists(&self, locator: &str) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryObjectStore::new();
        store.put("files/abc", b"hello", "text/plain").await.unwrap();
        assert_eq!(store.get("files/abc").await.unwrap(), b"hello");
        assert_eq!(store.mime_of("files/abc").await.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_put_is_idempotent_by_locator() {
        let store = MemoryObjectStore::new();
        store.put("files/abc", b"same", "text/plain").await.unwrap();
        store.put("files/abc", b"same", "text/plain").await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_then_exists_false() {
        let store = MemoryObjectStore::new();
        store.put("files/abc", b"x", "text/plain").await.unwrap();
        store.remove("files/abc").await.unwrap();
        assert!(!store.exists("files/abc").await.unwrap());
        assert!(matches!(
            store.get("files/abc").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let store = MemoryObjectStore::new();
        store.remove("files/nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_presign_carries_disposition() {
        let store = MemoryObjectStore::new();
        store.put("files/abc", b"x", "text/plain").await.unwrap();
        let url = store
            .presign_get(
                "files/abc",
                Disposition::Attachment,
                "notes.txt",
                Duration::from_secs(600),
            )
            .await
            .unwrap();
        assert!(url.contains("X-Amz-Expires=600"));
        assert!(url.contains("attachment; filename=\"notes.txt\""));
    }

    #[tokio::test]
    async fn test_presign_missing_blob_not_found() {
        let store = MemoryObjectStore::new();
        let err = store
            .presign_get(
                "files/none",
                Disposition::Inline,
                "f",
                Duration::from_secs(60),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
