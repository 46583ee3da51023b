//! Daily Metrics Module
//!
//! Today's usage counters: active users, registrations, request totals and
//! latency, the concurrency gauge with its peak, and per-endpoint call
//! counts. Counters reset when the UTC calendar day changes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::info;

use crate::clock::Clock;
use crate::config::MetricsConfig;
use crate::models::TodayMetrics;

// == Day State ==
/// Collection-typed state of the current day, guarded by one lock together
/// with the date it belongs to.
#[derive(Debug)]
struct DayState {
    date: NaiveDate,
    active_users: HashSet<u64>,
    endpoint_calls: HashMap<String, i64>,
}

// == Daily Metrics ==
/// Today's counters.
///
/// Scalar counters are lock-free atomics. The first mutating call of a new
/// day resets them: a read-locked date check on every call, then a
/// write-locked re-check so concurrent callers reset only once. The live
/// concurrency gauge survives the reset, since requests that started
/// yesterday still decrement it when they finish.
pub struct DailyMetrics {
    clock: Arc<dyn Clock>,
    day: RwLock<DayState>,
    total_requests: AtomicI64,
    success_requests: AtomicI64,
    error_requests: AtomicI64,
    total_latency_ms: AtomicI64,
    new_users: AtomicI64,
    peak_concurrent: AtomicI64,
    current_concurrent: AtomicI64,
    active_users_initial: usize,
    endpoint_calls_initial: usize,
}

impl DailyMetrics {
    // == Constructor ==
    pub fn new(config: &MetricsConfig, clock: Arc<dyn Clock>) -> Self {
        let date = clock.now().date_naive();
        Self {
            clock,
            day: RwLock::new(DayState {
                date,
                active_users: HashSet::with_capacity(config.active_users_initial),
                endpoint_calls: HashMap::with_capacity(config.endpoint_calls_initial),
            }),
            total_requests: AtomicI64::new(0),
            success_requests: AtomicI64::new(0),
            error_requests: AtomicI64::new(0),
            total_latency_ms: AtomicI64::new(0),
            new_users: AtomicI64::new(0),
            peak_concurrent: AtomicI64::new(0),
            current_concurrent: AtomicI64::new(0),
            active_users_initial: config.active_users_initial,
            endpoint_calls_initial: config.endpoint_calls_initial,
        }
    }

    // == Recording ==
    /// Adds a user to today's active set. Repeated logins count once.
    pub fn record_login(&self, user_id: u64) {
        self.roll_over_if_needed();
        self.day.write().active_users.insert(user_id);
    }

    pub fn record_register(&self) {
        self.roll_over_if_needed();
        self.new_users.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one finished request.
    ///
    /// # Arguments
    /// * `endpoint` - Route or handler name the call is attributed to
    /// * `latency_ms` - Time spent serving the request
    /// * `is_success` - Counted towards the success rate
    /// * `is_error` - Counted as an error request
    pub fn record_request(&self, endpoint: &str, latency_ms: i64, is_success: bool, is_error: bool) {
        self.roll_over_if_needed();

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if is_success {
            self.success_requests.fetch_add(1, Ordering::Relaxed);
        }
        if is_error {
            self.error_requests.fetch_add(1, Ordering::Relaxed);
        }

        let mut day = self.day.write();
        match day.endpoint_calls.get_mut(endpoint) {
            Some(calls) => *calls += 1,
            None => {
                day.endpoint_calls.insert(endpoint.to_string(), 1);
            }
        }
    }

    // == Concurrency Gauge ==
    /// Marks a request as in flight and raises the peak if it is a new high.
    pub fn increment_concurrent(&self) {
        self.roll_over_if_needed();
        let current = self.current_concurrent.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_concurrent.fetch_max(current, Ordering::AcqRel);
    }

    /// Marks a request as finished. The gauge never drops below zero.
    pub fn decrement_concurrent(&self) {
        let _ = self
            .current_concurrent
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current > 0).then(|| current - 1)
            });
    }

    pub fn current_concurrent(&self) -> i64 {
        self.current_concurrent.load(Ordering::Acquire)
    }

    // == Snapshot ==
    /// Returns today's counters and the values derived from them.
    pub fn today(&self) -> TodayMetrics {
        self.roll_over_if_needed();

        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let success_requests = self.success_requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        let (avg_latency_ms, success_rate) = if total_requests > 0 {
            (
                total_latency as f64 / total_requests as f64,
                success_requests as f64 * 100.0 / total_requests as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let day = self.day.read();
        TodayMetrics {
            date: day.date,
            active_users: day.active_users.len(),
            new_users: self.new_users.load(Ordering::Relaxed),
            total_requests,
            success_requests,
            error_requests: self.error_requests.load(Ordering::Relaxed),
            peak_concurrent: self.peak_concurrent.load(Ordering::Acquire),
            current_concurrent: self.current_concurrent.load(Ordering::Acquire),
            avg_latency_ms,
            success_rate,
            top_endpoint: top_endpoint(&day.endpoint_calls),
        }
    }

    // == Rollover ==
    fn roll_over_if_needed(&self) {
        let today = self.clock.now().date_naive();
        if self.day.read().date == today {
            return;
        }

        let mut day = self.day.write();
        if day.date == today {
            return;
        }

        let previous = day.date;
        day.date = today;
        day.active_users = HashSet::with_capacity(self.active_users_initial);
        day.endpoint_calls = HashMap::with_capacity(self.endpoint_calls_initial);
        for counter in [
            &self.total_requests,
            &self.success_requests,
            &self.error_requests,
            &self.total_latency_ms,
            &self.new_users,
            &self.peak_concurrent,
        ] {
            counter.store(0, Ordering::Release);
        }

        info!(from = %previous, to = %today, "Daily metrics rolled over");
    }
}

/// Endpoint with the most calls; equal counts go to the smallest name.
fn top_endpoint(calls: &HashMap<String, i64>) -> Option<String> {
    calls
        .iter()
        .max_by(|(a_name, a_calls), (b_name, b_calls)| {
            a_calls.cmp(b_calls).then_with(|| b_name.cmp(a_name))
        })
        .map(|(name, _)| name.clone())
}
