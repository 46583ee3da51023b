//! Error types for the service layer
//!
//! Provides unified error handling using thiserror. Cache primitives never
//! fail; everything that can fail (repository reads, blob I/O, upload
//! bookkeeping) reports through [`ServiceError`].

use thiserror::Error;

// == Service Error Enum ==
/// Unified error type for the service layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Requested entity does not exist in the backing repository
    #[error("Not found: {0}")]
    NotFound(String),

    /// Repository collaborator failed
    #[error("Repository error: {0}")]
    Repository(String),

    /// Blob store collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// No upload session exists under the given ID
    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    /// Caller does not own the resource
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Merge attempted before every chunk was present in the blob store
    #[error("Upload {upload_id} incomplete, missing chunks {missing:?}")]
    IncompleteUpload {
        upload_id: String,
        missing: Vec<u32>,
    },

    /// Operation not allowed in the session's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Session is busy with blob cleanup; retry shortly
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Caller deadline elapsed before the operation finished
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Caller cancelled the operation
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Cached payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    // == Retryable ==
    /// Returns true when the same call may succeed later without any change
    /// to the request (upload more chunks, wait out a slow backend).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::IncompleteUpload { .. }
                | ServiceError::Conflict(_)
                | ServiceError::Timeout(_)
                | ServiceError::Storage(_)
        )
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the service layer.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_upload_is_retryable() {
        let err = ServiceError::IncompleteUpload {
            upload_id: "u1".to_string(),
            missing: vec![2],
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("missing chunks [2]"));
    }

    #[test]
    fn test_permission_and_lookup_errors_are_not_retryable() {
        assert!(!ServiceError::UploadNotFound("u1".into()).is_retryable());
        assert!(!ServiceError::Unauthorized("u1".into()).is_retryable());
        assert!(!ServiceError::InvalidState("done".into()).is_retryable());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: ServiceError = io.into();
        assert!(matches!(err, ServiceError::Storage(msg) if msg.contains("disk gone")));
    }
}
