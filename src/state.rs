//! Application State
//!
//! The composition root's handle: every manager constructed once, shared by
//! whatever serves requests.

use std::sync::Arc;

use crate::cache::CacheService;
use crate::clock::Clock;
use crate::config::Config;
use crate::metrics::{DailyMetrics, RealtimeMetrics, Telemetry};
use crate::repository::ArticleRepository;
use crate::storage::BlobStore;
use crate::tasks::{
    spawn_cache_cleanup_task, spawn_presence_sweep_task, spawn_upload_sweep_task,
    spawn_warmup_task, BackgroundTasks,
};
use crate::upload::UploadCoordinator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheService>,
    pub daily: Arc<DailyMetrics>,
    pub realtime: Arc<RealtimeMetrics>,
    /// Request hook feeding `daily` and `realtime`
    pub telemetry: Telemetry,
    pub uploads: Arc<UploadCoordinator>,
}

impl AppState {
    /// Creates every manager from configuration. Nothing is spawned yet.
    ///
    /// # Arguments
    /// * `config` - Loaded configuration
    /// * `repo` - Article source behind the cache service
    /// * `store` - Blob store for upload chunks
    /// * `clock` - Time source shared by metrics and uploads
    pub fn new(
        config: &Config,
        repo: Arc<dyn ArticleRepository>,
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let daily = Arc::new(DailyMetrics::new(&config.metrics, clock.clone()));
        let realtime = Arc::new(RealtimeMetrics::new(&config.metrics, clock.clone()));
        Self {
            cache: Arc::new(CacheService::new(repo, &config.cache)),
            telemetry: Telemetry::new(daily.clone(), realtime.clone()),
            daily,
            realtime,
            uploads: Arc::new(UploadCoordinator::new(store, clock, &config.upload)),
        }
    }

    /// Spawns the cache warm-up and the periodic sweeps into `tasks`.
    pub fn spawn_background(&self, config: &Config, tasks: &mut BackgroundTasks) {
        let token = tasks.token();
        tasks.push("cache-warmup", spawn_warmup_task(self.cache.clone(), token.clone()));
        tasks.push(
            "cache-cleanup",
            spawn_cache_cleanup_task(self.cache.clone(), config.cache.cleanup_interval, token.clone()),
        );
        tasks.push(
            "presence-sweep",
            spawn_presence_sweep_task(
                self.realtime.clone(),
                config.metrics.online_user_cleanup_interval,
                token.clone(),
            ),
        );
        tasks.push(
            "upload-sweep",
            spawn_upload_sweep_task(self.uploads.clone(), config.upload.sweep_interval, token),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::repository::InMemoryArticleRepository;
    use crate::storage::MemoryBlobStore;
    use std::time::Duration;

    fn state(config: &Config) -> AppState {
        AppState::new(
            config,
            Arc::new(InMemoryArticleRepository::new()),
            Arc::new(MemoryBlobStore::new("http://cdn")),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn test_telemetry_shares_metrics_managers() {
        let state = state(&Config::default());
        state.telemetry.begin("/articles").finish(200, 9);

        assert_eq!(state.daily.today().total_requests, 1);
        assert_eq!(state.realtime.online_users(), 1);
    }

    #[tokio::test]
    async fn test_background_tasks_start_and_stop() {
        let config = Config::default();
        let state = state(&config);
        let mut tasks = BackgroundTasks::new();

        state.spawn_background(&config, &mut tasks);
        assert_eq!(tasks.len(), 4);

        tokio::time::timeout(Duration::from_secs(5), tasks.shutdown(Duration::from_secs(1)))
            .await
            .unwrap();
    }
}
