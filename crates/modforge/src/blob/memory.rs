use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use super::{sanitize_name, BlobError, BlobStore, SignedReference};

const SCHEME: &str = "mem://";

struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// Process-local blob store with `mem://<uuid>/<name>` handles.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded at upload.
    pub fn content_type(&self, handle: &str) -> Option<String> {
        self.blobs
            .read()
            .ok()?
            .get(handle)
            .map(|b| b.content_type.clone())
    }

    fn check_handle(handle: &str) -> Result<(), BlobError> {
        if handle.starts_with(SCHEME) {
            Ok(())
        } else {
            Err(BlobError::InvalidHandle(handle.to_string()))
        }
    }

    fn unavailable() -> BlobError {
        BlobError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bytes: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let handle = format!(
            "{}{}/{}",
            SCHEME,
            uuid::Uuid::new_v4(),
            sanitize_name(suggested_name)
        );
        self.blobs.write().map_err(|_| Self::unavailable())?.insert(
            handle.clone(),
            StoredBlob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(handle)
    }

    async fn download(&self, handle: &str) -> Result<Vec<u8>, BlobError> {
        Self::check_handle(handle)?;
        self.blobs
            .read()
            .map_err(|_| Self::unavailable())?
            .get(handle)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| BlobError::NotFound(handle.to_string()))
    }

    async fn delete(&self, handle: &str) -> Result<(), BlobError> {
        Self::check_handle(handle)?;
        self.blobs
            .write()
            .map_err(|_| Self::unavailable())?
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(handle.to_string()))
    }

    async fn sign(&self, handle: &str, ttl: Duration) -> Result<SignedReference, BlobError> {
        Self::check_handle(handle)?;
        if !self
            .blobs
            .read()
            .map_err(|_| Self::unavailable())?
            .contains_key(handle)
        {
            return Err(BlobError::NotFound(handle.to_string()));
        }
        Ok(SignedReference::expiring_in(handle, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_content_type() {
        let store = MemoryBlobStore::new();
        let handle = store
            .upload(b"local x = 1", "init.lua", "text/x-lua")
            .await
            .unwrap();
        assert!(handle.starts_with("mem://"));
        assert!(handle.ends_with("/init.lua"));
        assert_eq!(store.download(&handle).await.unwrap(), b"local x = 1");
        assert_eq!(store.content_type(&handle).as_deref(), Some("text/x-lua"));
    }

    #[tokio::test]
    async fn test_missing_and_foreign_handles() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.download("mem://nope/x").await,
            Err(BlobError::NotFound(_))
        ));
        assert!(matches!(
            store.download("s3://bucket/x").await,
            Err(BlobError::InvalidHandle(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_and_sign() {
        let store = MemoryBlobStore::new();
        let handle = store.upload(b"x", "a.json", "application/json").await.unwrap();
        let signed = store.sign(&handle, Duration::from_secs(5)).await.unwrap();
        assert_eq!(signed.url, handle);

        store.delete(&handle).await.unwrap();
        assert!(store.is_empty());
        assert!(store.sign(&handle, Duration::from_secs(5)).await.is_err());
    }
}
