//! Community Core - service host
//!
//! Builds every manager, runs the background tasks and stops them cleanly
//! on SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use community_core::{
    AppState, ArticleRepository, BackgroundTasks, Config, FsBlobStore, InMemoryArticleRepository,
    SystemClock,
};

/// Time each background task gets to stop before it is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the article catalog and the blob store
/// 4. Construct the managers into an `AppState`
/// 5. Start warm-up and the periodic sweeps
/// 6. Wait for SIGINT/SIGTERM, then stop every task
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" for this crate, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "community_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting community core");

    let config = Config::from_env();
    info!(
        storage_root = %config.upload.storage_root.display(),
        chunk_size = config.upload.chunk_size_bytes,
        article_capacity = config.cache.article.capacity,
        "Configuration loaded"
    );

    let repo: Arc<dyn ArticleRepository> = match &config.catalog_path {
        Some(path) => Arc::new(
            InMemoryArticleRepository::load(path)
                .await
                .with_context(|| format!("loading article catalog {}", path.display()))?,
        ),
        None => {
            info!("No article catalog configured, serving an empty one");
            Arc::new(InMemoryArticleRepository::new())
        }
    };

    let store = FsBlobStore::open(&config.upload.storage_root, &config.upload.public_base_url)
        .await
        .context("opening blob store")?;

    let state = AppState::new(&config, repo, Arc::new(store), Arc::new(SystemClock));
    let mut tasks = BackgroundTasks::new();
    state.spawn_background(&config, &mut tasks);
    info!(tasks = tasks.len(), "Background tasks started");

    shutdown_signal().await?;

    tasks.shutdown(SHUTDOWN_GRACE).await;
    let stats = state.cache.cache_stats();
    info!(
        article_hit_rate = stats.article.hit_rate(),
        sessions = state.uploads.session_count(),
        "Shutdown complete"
    );
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("installing SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("installing Ctrl+C handler")?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("installing Ctrl+C handler")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
