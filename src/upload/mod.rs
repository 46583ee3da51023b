//! Upload Module
//!
//! Chunked, resumable uploads backed by a [`crate::storage::BlobStore`].

mod coordinator;
mod session;

pub use coordinator::{SweepReport, UploadCoordinator};
pub use session::{chunk_path, storage_path, validate_upload_id, UploadSession, MAX_UPLOAD_ID_LEN};
