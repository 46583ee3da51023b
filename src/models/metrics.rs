//! Metrics views

use chrono::NaiveDate;
use serde::Serialize;

/// Derived view of today's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayMetrics {
    pub date: NaiveDate,
    pub active_users: usize,
    pub new_users: i64,
    pub total_requests: i64,
    pub success_requests: i64,
    pub error_requests: i64,
    pub peak_concurrent: i64,
    pub current_concurrent: i64,
    /// Mean latency in milliseconds, 0 without requests
    pub avg_latency_ms: f64,
    /// Percentage of successful requests, 0 without requests
    pub success_rate: f64,
    /// Most called endpoint; ties resolve to the lexicographically smallest name
    pub top_endpoint: Option<String>,
}

/// Process resource sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemMetrics {
    /// Heuristic: alive async tasks relative to a configured baseline, capped at 100.
    /// Not a CPU measurement.
    pub cpu_percent: f64,
    /// Resident memory of this process as a share of total system memory
    pub memory_percent: f64,
}

/// Everything the realtime dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeSnapshot {
    pub online_users: usize,
    pub current_qps: i64,
    pub last_error_time: Option<String>,
    pub system: SystemMetrics,
    pub uptime_secs: i64,
}
