//! Metrics Module
//!
//! Usage metrics kept in process memory: today's counters that reset at UTC
//! midnight, the realtime view (presence, QPS, last error, resources), and
//! the request telemetry hook that feeds both.

mod daily;
mod realtime;
mod telemetry;

pub use daily::DailyMetrics;
pub use realtime::{RealtimeMetrics, ERROR_TIME_FORMAT};
pub use telemetry::{RequestGuard, Telemetry};
