//! Cache Warm-up Task

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::CacheService;
use crate::context::RequestContext;

/// Spawns a one-shot task that preloads categories and tags.
///
/// Shutdown cancels the in-flight repository calls through the request
/// context; the warm-up then logs the failures and returns.
pub fn spawn_warmup_task(cache: Arc<CacheService>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctx = RequestContext::with_token(shutdown.child_token());
        let warmed = cache.warm_up(&ctx).await;
        if shutdown.is_cancelled() {
            info!(warmed, "Cache warm-up interrupted by shutdown");
        }
    })
}
