//! Request telemetry
//!
//! The per-request hook an HTTP layer calls to feed both metrics managers.
//! [`Telemetry::begin`] opens the request; the returned guard closes it.

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::{DailyMetrics, RealtimeMetrics};

/// Feeds request lifecycle events into the metrics managers.
#[derive(Clone)]
pub struct Telemetry {
    daily: Arc<DailyMetrics>,
    realtime: Arc<RealtimeMetrics>,
}

impl Telemetry {
    pub fn new(daily: Arc<DailyMetrics>, realtime: Arc<RealtimeMetrics>) -> Self {
        Self { daily, realtime }
    }

    pub fn daily(&self) -> &Arc<DailyMetrics> {
        &self.daily
    }

    pub fn realtime(&self) -> &Arc<RealtimeMetrics> {
        &self.realtime
    }

    /// Opens a request: raises the concurrency gauge and counts it for QPS.
    pub fn begin(&self, endpoint: impl Into<String>) -> RequestGuard {
        self.daily.increment_concurrent();
        self.realtime.record_request();
        RequestGuard {
            telemetry: self.clone(),
            endpoint: endpoint.into(),
            started: Instant::now(),
        }
    }
}

/// An in-flight request. Dropping it lowers the concurrency gauge, whether
/// or not [`RequestGuard::finish`] was called.
pub struct RequestGuard {
    telemetry: Telemetry,
    endpoint: String,
    started: Instant,
}

impl RequestGuard {
    /// Records the outcome of the request.
    ///
    /// # Arguments
    /// * `status` - HTTP status code of the response
    /// * `user_id` - Authenticated user, 0 for anonymous requests
    ///
    /// 2xx counts as success and 4xx/5xx as errors; 5xx also updates the
    /// last error time.
    pub fn finish(self, status: u16, user_id: u64) {
        let latency_ms = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let is_success = (200..300).contains(&status);
        let is_error = status >= 400;

        let Telemetry { daily, realtime } = &self.telemetry;
        daily.record_request(&self.endpoint, latency_ms, is_success, is_error);
        if user_id != 0 {
            realtime.record_user_activity(user_id);
        }
        if status >= 500 {
            realtime.record_error();
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.telemetry.daily.decrement_concurrent();
    }
}
