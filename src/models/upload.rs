//! Chunked upload DTOs

use serde::{Deserialize, Serialize};

/// Lifecycle of an upload session. Only `Pending` accepts changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Completed,
    Cancelled,
}

impl UploadStatus {
    /// Numeric code as persisted by the relational store.
    pub fn code(self) -> u8 {
        match self {
            UploadStatus::Pending => 0,
            UploadStatus::Completed => 1,
            UploadStatus::Cancelled => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(UploadStatus::Pending),
            1 => Some(UploadStatus::Completed),
            2 => Some(UploadStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, UploadStatus::Pending)
    }
}

/// Request to start or resume an upload.
#[derive(Debug, Clone, Deserialize)]
pub struct InitUploadRequest {
    /// Client-chosen identifier, typically the file digest
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub total_chunks: u32,
}

/// Progress handed back by `init_upload`, so a client knows which chunks to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitUploadResponse {
    pub upload_id: String,
    /// Indices already recorded, ascending
    pub uploaded_chunks: Vec<u32>,
    pub chunk_size: usize,
}

/// Reference to a completed upload.
///
/// Chunks are not concatenated server-side: the file is the blobs
/// `{storage_path}/chunk_0 .. chunk_{total_chunks - 1}` read in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeChunksResponse {
    pub storage_path: String,
    pub file_url: String,
    pub total_chunks: u32,
}

/// Read-only progress view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub total_chunks: u32,
    pub uploaded_chunks: Vec<u32>,
    /// 0.0 - 100.0
    pub progress: f64,
    pub status: UploadStatus,
}
