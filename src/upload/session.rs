//! Upload session state

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::{Result, ServiceError};
use crate::models::{InitUploadResponse, MergeChunksResponse, UploadStatus, UploadStatusResponse};

/// Longest accepted upload id.
pub const MAX_UPLOAD_ID_LEN: usize = 128;

/// Blob directory holding every chunk of an upload.
pub fn storage_path(upload_id: &str) -> String {
    format!("chunks/{upload_id}")
}

/// Blob path of one chunk.
pub fn chunk_path(upload_id: &str, index: u32) -> String {
    format!("chunks/{upload_id}/chunk_{index}")
}

/// Upload ids become blob path segments, so only a conservative character
/// set is accepted.
pub fn validate_upload_id(upload_id: &str) -> Result<()> {
    let valid = !upload_id.is_empty()
        && upload_id.len() <= MAX_UPLOAD_ID_LEN
        && upload_id != "."
        && upload_id != ".."
        && upload_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ServiceError::InvalidRequest(format!(
            "invalid upload id: {upload_id:?}"
        )))
    }
}

/// Bookkeeping of one upload.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_id: String,
    pub user_id: u64,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: usize,
    pub total_chunks: u32,
    /// Chunk indices recorded as written
    pub uploaded: BTreeSet<u32>,
    pub status: UploadStatus,
    /// Set once the upload completes
    pub storage_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Blob cleanup is running; the session accepts no changes meanwhile
    pub(crate) purging: bool,
}

impl UploadSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Pending and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == UploadStatus::Pending && !self.is_expired(now)
    }

    /// Cancelled, or pending past its expiry.
    pub fn is_abandoned(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            UploadStatus::Cancelled => true,
            UploadStatus::Pending => self.is_expired(now),
            UploadStatus::Completed => false,
        }
    }

    /// Fails unless chunks may still be added or merged.
    pub(crate) fn ensure_writable(&self, now: DateTime<Utc>) -> Result<()> {
        if self.purging {
            return Err(ServiceError::Conflict(format!(
                "upload {} is being cleaned up",
                self.upload_id
            )));
        }
        match self.status {
            UploadStatus::Pending if self.is_expired(now) => Err(ServiceError::InvalidState(
                format!("upload {} has expired", self.upload_id),
            )),
            UploadStatus::Pending => Ok(()),
            status => Err(ServiceError::InvalidState(format!(
                "upload {} is {status:?}",
                self.upload_id
            ))),
        }
    }

    /// Uploaded share in percent.
    pub fn progress(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        self.uploaded.len() as f64 * 100.0 / f64::from(self.total_chunks)
    }

    pub fn init_response(&self) -> InitUploadResponse {
        InitUploadResponse {
            upload_id: self.upload_id.clone(),
            uploaded_chunks: self.uploaded.iter().copied().collect(),
            chunk_size: self.chunk_size,
        }
    }

    pub fn status_response(&self) -> UploadStatusResponse {
        UploadStatusResponse {
            upload_id: self.upload_id.clone(),
            total_chunks: self.total_chunks,
            uploaded_chunks: self.uploaded.iter().copied().collect(),
            progress: self.progress(),
            status: self.status,
        }
    }

    pub(crate) fn merge_response(&self, file_url: String) -> MergeChunksResponse {
        MergeChunksResponse {
            storage_path: self
                .storage_path
                .clone()
                .unwrap_or_else(|| storage_path(&self.upload_id)),
            file_url,
            total_chunks: self.total_chunks,
        }
    }
}
