//! Request Context
//!
//! Deadline and cancellation carried from the caller into collaborator
//! calls. Read-through paths hand the same context to the repository and
//! wrap its future in [`RequestContext::run`], so an expired deadline or a
//! cancelled token surfaces as an error instead of a cached value.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ServiceError};

/// Caller-supplied deadline and cancellation token.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// A context with no deadline that is never cancelled unless asked to.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// Wraps an existing token, e.g. the process shutdown token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    /// Derives a context that ends at the earlier of this deadline and
    /// `now + timeout`, and is cancelled whenever this one is.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `fut` until it finishes, the deadline passes, or the context is
    /// cancelled. `what` names the operation in the resulting error.
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled(what.to_string()));
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled(what.to_string())),
            _ = deadline => Err(ServiceError::Timeout(what.to_string())),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_inner_result() {
        let ctx = RequestContext::new();
        let value = ctx.run("load", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let result: Result<()> = ctx
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Timeout(what)) if what == "slow"));
    }

    #[tokio::test]
    async fn test_run_observes_cancellation() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let result: Result<u8> = ctx.run("never", async { Ok(1) }).await;
        assert!(matches!(result, Err(ServiceError::Cancelled(_))));
    }

    #[test]
    fn test_pending_run_wakes_on_cancel() {
        let ctx = RequestContext::new();
        let mut run = tokio_test::task::spawn(
            ctx.run("wait", std::future::pending::<Result<()>>()),
        );
        tokio_test::assert_pending!(run.poll());

        ctx.cancel();
        assert!(run.is_woken());
        let result = tokio_test::assert_ready!(run.poll());
        assert!(matches!(result, Err(ServiceError::Cancelled(what)) if what == "wait"));
    }

    #[tokio::test]
    async fn test_child_is_cancelled_with_parent() {
        let parent = RequestContext::new();
        let child = parent.child_with_timeout(Duration::from_secs(30));
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_keeps_earlier_deadline() {
        let parent = RequestContext::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
