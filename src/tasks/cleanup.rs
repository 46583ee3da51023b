//! Periodic Sweep Tasks
//!
//! Background loops that keep in-memory state bounded: expired cache
//! entries, idle presence records and abandoned upload sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::CacheService;
use crate::metrics::RealtimeMetrics;
use crate::upload::UploadCoordinator;

/// First tick one period from now; late ticks are delayed, not bunched.
fn sweep_interval(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Spawns a background task that periodically removes expired cache entries
/// and prunes the article detail index.
///
/// # Arguments
/// * `cache` - Shared cache service
/// * `period` - Time between sweeps
/// * `shutdown` - Stops the loop when cancelled
pub fn spawn_cache_cleanup_task(
    cache: Arc<CacheService>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "Cache cleanup task started");
        let mut interval = sweep_interval(period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let removed = cache.cleanup_expired();
            if removed > 0 {
                info!(removed, "Cache cleanup removed expired entries");
            } else {
                debug!("Cache cleanup found no expired entries");
            }
        }

        info!("Cache cleanup task stopped");
    })
}

/// Spawns a background task that drops users idle past the presence expiry.
pub fn spawn_presence_sweep_task(
    realtime: Arc<RealtimeMetrics>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "Presence sweep task started");
        let mut interval = sweep_interval(period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let removed = realtime.sweep_inactive();
            debug!(removed, online = realtime.online_users(), "Presence sweep finished");
        }

        info!("Presence sweep task stopped");
    })
}

/// Spawns a background task that deletes cancelled and expired upload
/// sessions together with their chunk blobs.
///
/// A sweep in progress finishes before the loop observes shutdown, so no
/// session is left marked as purging.
pub fn spawn_upload_sweep_task(
    uploads: Arc<UploadCoordinator>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = period.as_secs(), "Upload sweep task started");
        let mut interval = sweep_interval(period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let report = uploads.sweep_sessions().await;
            debug!(
                removed_sessions = report.removed_sessions,
                failed = report.failed,
                remaining = uploads.session_count(),
                "Upload sweep finished"
            );
        }

        info!("Upload sweep task stopped");
    })
}
