//! Blob Storage Module
//!
//! The byte store that upload chunks are written to. Paths are relative,
//! `/`-separated and never escape the store's root.

mod fs;
mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use crate::error::{Result, ServiceError};

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

/// Blob store consumed by the upload coordinator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes a blob, replacing any previous content.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Reads a whole blob. Missing blobs yield [`ServiceError::NotFound`].
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Deletes a blob. Deleting a missing blob succeeds.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Lists the blobs stored directly under `dir`, sorted by path.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Public URL a client can fetch `path` from.
    fn public_url_for(&self, path: &str) -> String;
}

/// Validates a blob path and returns its canonical `a/b/c` form.
///
/// Rejects empty and absolute paths, `..` segments, backslashes and NUL
/// bytes. Empty and `.` segments are dropped.
pub fn normalize_blob_path(path: &str) -> Result<String> {
    if path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        warn!(path, "Rejected blob path");
        return Err(ServiceError::InvalidRequest(format!("invalid blob path: {path:?}")));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                warn!(path, "Rejected blob path escaping the store root");
                return Err(ServiceError::InvalidRequest(format!(
                    "blob path escapes root: {path:?}"
                )));
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(ServiceError::InvalidRequest("empty blob path".to_string()));
    }
    Ok(segments.join("/"))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
