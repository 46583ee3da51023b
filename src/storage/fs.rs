//! Filesystem blob store
//!
//! Blobs are files under a root directory. Writes go to a temporary sibling
//! and are renamed into place, so readers never observe a partial blob.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use super::{join_url, normalize_blob_path, BlobStore};
use crate::error::{Result, ServiceError};

const TEMP_MARKER: &str = ".tmp.";

/// Blob store rooted at a local directory.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
    temp_seq: AtomicU64,
}

impl FsBlobStore {
    /// Opens a store at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| storage_error("create root", &root, e))?;
        debug!(root = %root.display(), "Filesystem blob store opened");

        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
            temp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf)> {
        let normalized = normalize_blob_path(path)?;
        let full = self.root.join(&normalized);
        Ok((normalized, full))
    }
}

fn storage_error(op: &str, path: &Path, err: std::io::Error) -> ServiceError {
    ServiceError::Storage(format!("{op} {}: {err}", path.display()))
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let (_, full) = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create dir", parent, e))?;
        }

        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let mut temp_name = full.clone().into_os_string();
        temp_name.push(format!("{TEMP_MARKER}{seq}"));
        let temp = PathBuf::from(temp_name);

        if let Err(e) = fs::write(&temp, &data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(storage_error("write", &temp, e));
        }
        if let Err(e) = fs::rename(&temp, &full).await {
            let _ = fs::remove_file(&temp).await;
            return Err(storage_error("rename", &full, e));
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let (_, full) = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error("stat", &full, e)),
        }
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let (normalized, full) = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServiceError::NotFound(format!("blob {normalized}")))
            }
            Err(e) => Err(storage_error("read", &full, e)),
        }
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let (_, full) = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(storage_error("remove", &full, e)),
        }

        // Drop the parent directory once it is empty; failure means it is not.
        if let Some(parent) = full.parent() {
            if parent != self.root {
                let _ = fs::remove_dir(parent).await;
            }
        }
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let (normalized, full) = self.resolve(dir)?;
        let mut entries = match fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("list", &full, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("list", &full, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && !name.contains(TEMP_MARKER) {
                paths.push(format!("{normalized}/{name}"));
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn public_url_for(&self, path: &str) -> String {
        join_url(&self.public_base_url, path)
    }
}
