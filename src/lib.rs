//! Community Core - in-process services for a community platform backend
//!
//! Read-through caching of article data, daily and realtime usage metrics,
//! and resumable chunked uploads. The HTTP layer lives elsewhere; it holds
//! an [`AppState`] and calls into the managers.

pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod upload;

pub use cache::CacheService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use context::RequestContext;
pub use error::{Result, ServiceError};
pub use metrics::{DailyMetrics, RealtimeMetrics, RequestGuard, Telemetry};
pub use repository::{ArticleRepository, InMemoryArticleRepository};
pub use state::AppState;
pub use storage::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use tasks::BackgroundTasks;
pub use upload::{SweepReport, UploadCoordinator};
