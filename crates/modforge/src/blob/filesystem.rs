use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{sanitize_name, BlobError, BlobStore, SignedReference};

/// Blob store keeping each blob as one file under `root`.
///
/// Handles have the form `<public_base_url>/<key>`, so a static file server
/// mounted on `root` can serve them directly.
pub struct FileBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn handle_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Maps a handle back to its file, rejecting anything that would
    /// escape `root`.
    fn path_for(&self, handle: &str) -> Result<PathBuf, BlobError> {
        let key = handle
            .strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| BlobError::InvalidHandle(handle.to_string()))?;
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(BlobError::InvalidHandle(handle.to_string()));
        }
        Ok(self.root.join(key))
    }

    async fn ensure_root(&self) -> Result<(), BlobError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BlobError::Io {
                path: self.root.clone(),
                source: e,
            })
    }
}

fn io_error(path: &Path, handle: &str, e: std::io::Error) -> BlobError {
    if e.kind() == std::io::ErrorKind::NotFound {
        BlobError::NotFound(handle.to_string())
    } else {
        BlobError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn upload(
        &self,
        bytes: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String, BlobError> {
        self.ensure_root().await?;

        let key = format!("{}_{}", uuid::Uuid::new_v4(), sanitize_name(suggested_name));
        let path = self.root.join(&key);

        // create_new: a key collision must never overwrite an existing blob.
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| BlobError::Io {
                path: path.clone(),
                source: e,
            })?;
        file.write_all(bytes).await.map_err(|e| BlobError::Io {
            path: path.clone(),
            source: e,
        })?;
        file.flush().await.map_err(|e| BlobError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(key = %key, size = bytes.len(), content_type, "Stored blob");
        Ok(self.handle_for(&key))
    }

    async fn download(&self, handle: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(handle)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(&path, handle, e))
    }

    async fn delete(&self, handle: &str) -> Result<(), BlobError> {
        let path = self.path_for(handle)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| io_error(&path, handle, e))
    }

    async fn sign(&self, handle: &str, ttl: Duration) -> Result<SignedReference, BlobError> {
        let path = self.path_for(handle)?;
        tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(&path, handle, e))?;
        Ok(SignedReference::expiring_in(handle, ttl))
    }
}
