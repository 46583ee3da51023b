//! Realtime Metrics Module
//!
//! Online presence, requests per second, the last error timestamp and a
//! coarse process resource sample.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;

use crate::clock::Clock;
use crate::config::MetricsConfig;
use crate::models::{RealtimeSnapshot, SystemMetrics};

/// Display format of the last error timestamp (UTC).
pub const ERROR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// == Realtime Metrics ==
/// Live view of server activity.
pub struct RealtimeMetrics {
    clock: Arc<dyn Clock>,
    config: MetricsConfig,
    started_at: DateTime<Utc>,
    /// user id -> last activity
    online: RwLock<HashMap<u64, DateTime<Utc>>>,
    /// Unix second the accumulator belongs to
    qps_second: AtomicI64,
    /// Requests counted so far in `qps_second`
    qps_accumulator: AtomicI64,
    /// Count of the second before `qps_second`, 0 if that second was idle
    qps_published: AtomicI64,
    last_error: RwLock<Option<DateTime<Utc>>>,
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl RealtimeMetrics {
    // == Constructor ==
    pub fn new(config: &MetricsConfig, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            config: config.clone(),
            started_at,
            online: RwLock::new(HashMap::with_capacity(config.online_users_initial)),
            qps_second: AtomicI64::new(0),
            qps_accumulator: AtomicI64::new(0),
            qps_published: AtomicI64::new(0),
            last_error: RwLock::new(None),
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    // == Presence ==
    /// Marks a user as active now. User id 0 (anonymous) is ignored.
    pub fn record_user_activity(&self, user_id: u64) {
        if user_id == 0 {
            return;
        }
        let now = self.clock.now();
        self.online.write().insert(user_id, now);
    }

    pub fn online_users(&self) -> usize {
        self.online.read().len()
    }

    /// Removes users idle for longer than the configured expiry.
    ///
    /// Returns the number of users removed.
    pub fn sweep_inactive(&self) -> usize {
        let now = self.clock.now();
        let expire = self.config.online_user_expire;

        let mut online = self.online.write();
        let before = online.len();
        // A negative idle time (clock stepped back) keeps the user.
        online.retain(|_, last_seen| {
            now.signed_duration_since(*last_seen)
                .to_std()
                .map_or(true, |idle| idle <= expire)
        });
        let removed = before - online.len();
        drop(online);

        if removed > 0 {
            debug!(removed, "Inactive users swept");
        }
        removed
    }

    // == Requests Per Second ==
    /// Counts one request towards the current second.
    ///
    /// The first caller of a new second claims it with a compare-and-swap
    /// and swaps the accumulator out, so no request is counted twice. A
    /// request racing that claim may be attributed to the neighbouring
    /// second.
    pub fn record_request(&self) {
        let second = self.clock.now().timestamp();
        let last = self.qps_second.load(Ordering::Acquire);

        if second > last
            && self
                .qps_second
                .compare_exchange(last, second, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            let finished = self.qps_accumulator.swap(1, Ordering::AcqRel);
            let published = if second - last == 1 { finished } else { 0 };
            self.qps_published.store(published, Ordering::Release);
        } else {
            self.qps_accumulator.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Requests served during the last completed second.
    pub fn current_qps(&self) -> i64 {
        let now = self.clock.now().timestamp();
        let second = self.qps_second.load(Ordering::Acquire);
        match now - second {
            0 => self.qps_published.load(Ordering::Acquire),
            1 => self.qps_accumulator.load(Ordering::Acquire),
            _ => 0,
        }
    }

    // == Errors ==
    pub fn record_error(&self) {
        let now = self.clock.now();
        *self.last_error.write() = Some(now);
    }

    /// Time of the most recent error, formatted with [`ERROR_TIME_FORMAT`].
    pub fn last_error_time(&self) -> Option<String> {
        self.last_error
            .read()
            .map(|at| at.format(ERROR_TIME_FORMAT).to_string())
    }

    // == System ==
    /// Samples process resources.
    ///
    /// `cpu_percent` is not a CPU measurement: it is the number of alive
    /// tokio tasks relative to `cpu_task_baseline`, capped at 100, and 0
    /// when called outside a runtime. `memory_percent` is this process's
    /// resident memory over total system memory.
    pub fn system_metrics(&self) -> SystemMetrics {
        let baseline = self.config.cpu_task_baseline.max(1) as f64;
        let cpu_percent = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let alive = handle.metrics().num_alive_tasks() as f64;
                (alive / baseline * 100.0).min(100.0)
            }
            Err(_) => 0.0,
        };

        SystemMetrics {
            cpu_percent,
            memory_percent: self.memory_percent(),
        }
    }

    fn memory_percent(&self) -> f64 {
        let Some(pid) = self.pid else {
            return 0.0;
        };

        let mut system = self.system.lock();
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let total = system.total_memory();
        let resident = system.process(pid).map(|p| p.memory()).unwrap_or(0);
        if total == 0 {
            return 0.0;
        }
        resident as f64 * 100.0 / total as f64
    }

    pub fn uptime_secs(&self) -> i64 {
        self.clock
            .now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> RealtimeSnapshot {
        RealtimeSnapshot {
            online_users: self.online_users(),
            current_qps: self.current_qps(),
            last_error_time: self.last_error_time(),
            system: self.system_metrics(),
            uptime_secs: self.uptime_secs(),
        }
    }
}
