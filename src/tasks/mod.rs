//! Background Tasks Module
//!
//! Periodic and one-shot tasks that run alongside request handling, and the
//! handle that stops them on shutdown.
//!
//! # Tasks
//! - Cache cleanup: expired entries and the article detail index
//! - Presence sweep: users idle past the online expiry
//! - Upload sweep: cancelled and expired upload sessions
//! - Cache warm-up: one-shot preload at startup

mod cleanup;
mod warmup;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use cleanup::{spawn_cache_cleanup_task, spawn_presence_sweep_task, spawn_upload_sweep_task};
pub use warmup::spawn_warmup_task;

/// Owns the shutdown token and the handles of every spawned task.
pub struct BackgroundTasks {
    token: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Token to hand to tasks spawned for this set.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn push(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels the token and waits for every task to finish.
    ///
    /// A task still running after `grace` is aborted.
    pub async fn shutdown(self, grace: Duration) {
        self.token.cancel();
        for (name, mut handle) in self.handles {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => info!(task = name, "Background task finished"),
                Ok(Err(err)) => warn!(task = name, error = %err, "Background task failed"),
                Err(_) => {
                    handle.abort();
                    warn!(task = name, "Background task aborted after grace period");
                }
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_cooperative_tasks() {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.token();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tasks.push(
            "cooperative",
            tokio::spawn(async move {
                token.cancelled().await;
                let _ = tx.send(());
            }),
        );

        tasks.shutdown(Duration::from_secs(5)).await;
        assert!(rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_stuck_tasks() {
        let mut tasks = BackgroundTasks::new();
        tasks.push("stuck", tokio::spawn(std::future::pending::<()>()));
        assert_eq!(tasks.len(), 1);

        tasks.shutdown(Duration::from_millis(50)).await;
    }
}
