//! In-memory blob store backed by a sharded concurrent map.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::{join_url, normalize_blob_path, BlobStore};
use crate::error::{Result, ServiceError};

/// Blob store that keeps everything in process memory.
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
    public_base_url: String,
}

impl MemoryBlobStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            blobs: DashMap::new(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Sum of all blob sizes in bytes.
    pub fn total_bytes(&self) -> usize {
        self.blobs.iter().map(|blob| blob.value().len()).sum()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        self.blobs.insert(normalize_blob_path(path)?, data);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(&normalize_blob_path(path)?))
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let path = normalize_blob_path(path)?;
        self.blobs
            .get(&path)
            .map(|blob| blob.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("blob {path}")))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.blobs.remove(&normalize_blob_path(path)?);
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", normalize_blob_path(dir)?);
        let mut paths: Vec<String> = self
            .blobs
            .iter()
            .filter(|blob| {
                blob.key()
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('/'))
            })
            .map(|blob| blob.key().clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn public_url_for(&self, path: &str) -> String {
        join_url(&self.public_base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemoryBlobStore::new("http://cdn");
        store.put("a/b", Bytes::from_static(b"hello")).await.unwrap();

        assert!(store.exists("a/b").await.unwrap());
        assert_eq!(store.get("a//b").await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(store.total_bytes(), 5);

        store.remove("a/b").await.unwrap();
        store.remove("a/b").await.unwrap();
        assert!(!store.exists("a/b").await.unwrap());
        assert!(matches!(store.get("a/b").await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_shallow_and_sorted() {
        let store = MemoryBlobStore::new("http://cdn");
        for path in ["d/2", "d/1", "d/sub/3", "other/4"] {
            store.put(path, Bytes::new()).await.unwrap();
        }

        assert_eq!(store.list("d").await.unwrap(), vec!["d/1", "d/2"]);
        assert!(store.list("missing").await.unwrap().is_empty());
    }

    #[test]
    fn test_public_url() {
        let store = MemoryBlobStore::new("http://cdn/base/");
        assert_eq!(store.public_url_for("chunks/u1"), "http://cdn/base/chunks/u1");
    }
}
