//! Domain models and DTOs
//!
//! Data shapes exchanged with the repository and blob-store collaborators
//! and returned to the HTTP layer. Everything here is serde-serializable so
//! it can be cached as JSON or rendered directly by a handler.

pub mod article;
pub mod metrics;
pub mod upload;

// Re-export commonly used types
pub use article::{ArticleAuthor, ArticleCategory, ArticleDetail, ArticleTag};
pub use metrics::{RealtimeSnapshot, SystemMetrics, TodayMetrics};
pub use upload::{
    InitUploadRequest, InitUploadResponse, MergeChunksResponse, UploadStatus,
    UploadStatusResponse,
};
