//! Blob storage for original and processed artifacts.
//!
//! Handles returned by a store are opaque to every caller; only the store
//! that issued a handle can interpret it.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

mod filesystem;
mod memory;

pub use filesystem::FileBlobStore;
pub use memory::MemoryBlobStore;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob '{0}' not found")]
    NotFound(String),

    #[error("handle '{0}' was not issued by this store")]
    InvalidHandle(String),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Time-bounded reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedReference {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedReference {
    /// Reference valid for `ttl` from now.
    pub fn expiring_in(url: impl Into<String>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        Self {
            url: url.into(),
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns a handle for them.
    async fn upload(
        &self,
        bytes: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String, BlobError>;

    async fn download(&self, handle: &str) -> Result<Vec<u8>, BlobError>;

    async fn delete(&self, handle: &str) -> Result<(), BlobError>;

    /// Issues an access reference valid for `ttl`. Stores without signing
    /// return the handle itself as the URL.
    async fn sign(&self, handle: &str, ttl: Duration) -> Result<SignedReference, BlobError>;
}

/// Content type for an upload, guessed from its filename.
pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Reduces a suggested name to a single safe path component.
pub(crate) fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "blob".to_string()
    } else {
        cleaned.to_string()
    }
}
