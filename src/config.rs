//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.
//! Every limit, TTL and interval used by the caches, metrics managers and the
//! upload coordinator is read from here; nothing downstream hardcodes sizing.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const MIB: usize = 1024 * 1024;

/// Top-level configuration, one section per subsystem.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheConfig,
    pub metrics: MetricsConfig,
    pub upload: UploadConfig,
    /// JSON article catalog served when no relational store is attached
    pub catalog_path: Option<PathBuf>,
}

/// Sizing for one LRU cache group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LruGroupConfig {
    /// Maximum number of resident entries
    pub capacity: usize,
    /// Maximum resident payload bytes
    pub max_memory: usize,
    /// TTL applied by `set`
    pub ttl: Duration,
}

impl LruGroupConfig {
    fn new(capacity: usize, max_memory_mb: usize, ttl_secs: u64) -> Self {
        Self {
            capacity,
            max_memory: max_memory_mb * MIB,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn from_env(prefix: &str, defaults: LruGroupConfig) -> Self {
        Self {
            capacity: env_positive(&format!("{prefix}_CAPACITY"), defaults.capacity),
            max_memory: env_positive(&format!("{prefix}_MAX_MEMORY_MB"), defaults.max_memory / MIB)
                * MIB,
            ttl: env_secs(&format!("{prefix}_TTL_SECS"), defaults.ttl),
        }
    }
}

/// Cache layer configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL of the shared TTL cache
    pub default_ttl: Duration,
    /// Interval of the background expiry sweep
    pub cleanup_interval: Duration,
    pub article: LruGroupConfig,
    pub user: LruGroupConfig,
    pub list: LruGroupConfig,
    pub categories_ttl: Duration,
    pub tags_ttl: Duration,
    pub article_detail_ttl: Duration,
    pub online_count_ttl: Duration,
    /// Upper bound on the startup warm-up
    pub warmup_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            article: LruGroupConfig::new(500, 50, 300),
            user: LruGroupConfig::new(1000, 10, 600),
            list: LruGroupConfig::new(100, 20, 120),
            categories_ttl: Duration::from_secs(60 * 60),
            tags_ttl: Duration::from_secs(30 * 60),
            article_detail_ttl: Duration::from_secs(5 * 60),
            online_count_ttl: Duration::from_secs(10),
            warmup_timeout: Duration::from_secs(30),
        }
    }
}

/// Metrics managers configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// How often idle users are swept from the presence map
    pub online_user_cleanup_interval: Duration,
    /// Idle time after which a user counts as offline
    pub online_user_expire: Duration,
    /// Alive-task count treated as 100% in the CPU estimate
    pub cpu_task_baseline: usize,
    pub active_users_initial: usize,
    pub endpoint_calls_initial: usize,
    pub online_users_initial: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            online_user_cleanup_interval: Duration::from_secs(60),
            online_user_expire: Duration::from_secs(5 * 60),
            cpu_task_baseline: 200,
            active_users_initial: 500,
            endpoint_calls_initial: 50,
            online_users_initial: 1000,
        }
    }
}

/// Chunked upload configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Size clients are told to cut files into
    pub chunk_size_bytes: usize,
    /// Lifetime of a pending session
    pub session_ttl: Duration,
    /// Interval of the expired/cancelled session sweep
    pub sweep_interval: Duration,
    /// Root directory of the filesystem blob store
    pub storage_root: PathBuf,
    /// Public URL prefix for stored blobs
    pub public_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 2 * MIB,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
            storage_root: PathBuf::from("./data/blobs"),
            public_base_url: "http://localhost:9000/resource-chunks".to_string(),
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unset, unparsable, or zero values fall back to the defaults.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_SECS`, `CACHE_CLEANUP_INTERVAL_SECS`
    /// - `CACHE_{ARTICLE,USER,LIST}_{CAPACITY,MAX_MEMORY_MB,TTL_SECS}`
    /// - `CACHE_CATEGORIES_TTL_SECS`, `CACHE_TAGS_TTL_SECS`,
    ///   `CACHE_ARTICLE_DETAIL_TTL_SECS`, `CACHE_ONLINE_COUNT_TTL_SECS`,
    ///   `CACHE_WARMUP_TIMEOUT_SECS`
    /// - `METRICS_ONLINE_CLEANUP_INTERVAL_SECS`, `METRICS_ONLINE_EXPIRE_SECS`,
    ///   `METRICS_CPU_TASK_BASELINE`, `METRICS_ACTIVE_USERS_INITIAL`,
    ///   `METRICS_ENDPOINT_CALLS_INITIAL`, `METRICS_ONLINE_USERS_INITIAL`
    /// - `UPLOAD_CHUNK_SIZE_MB`, `UPLOAD_SESSION_TTL_SECS`,
    ///   `UPLOAD_SWEEP_INTERVAL_SECS`, `UPLOAD_STORAGE_ROOT`,
    ///   `UPLOAD_PUBLIC_BASE_URL`
    /// - `ARTICLE_CATALOG_PATH`
    pub fn from_env() -> Self {
        let cache_defaults = CacheConfig::default();
        let metrics_defaults = MetricsConfig::default();
        let upload_defaults = UploadConfig::default();

        Self {
            cache: CacheConfig {
                default_ttl: env_secs("CACHE_DEFAULT_TTL_SECS", cache_defaults.default_ttl),
                cleanup_interval: env_secs(
                    "CACHE_CLEANUP_INTERVAL_SECS",
                    cache_defaults.cleanup_interval,
                ),
                article: LruGroupConfig::from_env("CACHE_ARTICLE", cache_defaults.article),
                user: LruGroupConfig::from_env("CACHE_USER", cache_defaults.user),
                list: LruGroupConfig::from_env("CACHE_LIST", cache_defaults.list),
                categories_ttl: env_secs("CACHE_CATEGORIES_TTL_SECS", cache_defaults.categories_ttl),
                tags_ttl: env_secs("CACHE_TAGS_TTL_SECS", cache_defaults.tags_ttl),
                article_detail_ttl: env_secs(
                    "CACHE_ARTICLE_DETAIL_TTL_SECS",
                    cache_defaults.article_detail_ttl,
                ),
                online_count_ttl: env_secs(
                    "CACHE_ONLINE_COUNT_TTL_SECS",
                    cache_defaults.online_count_ttl,
                ),
                warmup_timeout: env_secs("CACHE_WARMUP_TIMEOUT_SECS", cache_defaults.warmup_timeout),
            },
            metrics: MetricsConfig {
                online_user_cleanup_interval: env_secs(
                    "METRICS_ONLINE_CLEANUP_INTERVAL_SECS",
                    metrics_defaults.online_user_cleanup_interval,
                ),
                online_user_expire: env_secs(
                    "METRICS_ONLINE_EXPIRE_SECS",
                    metrics_defaults.online_user_expire,
                ),
                cpu_task_baseline: env_positive(
                    "METRICS_CPU_TASK_BASELINE",
                    metrics_defaults.cpu_task_baseline,
                ),
                active_users_initial: env_positive(
                    "METRICS_ACTIVE_USERS_INITIAL",
                    metrics_defaults.active_users_initial,
                ),
                endpoint_calls_initial: env_positive(
                    "METRICS_ENDPOINT_CALLS_INITIAL",
                    metrics_defaults.endpoint_calls_initial,
                ),
                online_users_initial: env_positive(
                    "METRICS_ONLINE_USERS_INITIAL",
                    metrics_defaults.online_users_initial,
                ),
            },
            upload: UploadConfig {
                chunk_size_bytes: env_positive(
                    "UPLOAD_CHUNK_SIZE_MB",
                    upload_defaults.chunk_size_bytes / MIB,
                ) * MIB,
                session_ttl: env_secs("UPLOAD_SESSION_TTL_SECS", upload_defaults.session_ttl),
                sweep_interval: env_secs(
                    "UPLOAD_SWEEP_INTERVAL_SECS",
                    upload_defaults.sweep_interval,
                ),
                storage_root: env::var("UPLOAD_STORAGE_ROOT")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(upload_defaults.storage_root),
                public_base_url: env::var("UPLOAD_PUBLIC_BASE_URL")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .unwrap_or(upload_defaults.public_base_url),
            },
            catalog_path: env::var("ARTICLE_CATALOG_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

// == Env Helpers ==
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Reads a positive integer; zero counts as unset.
fn env_positive(key: &str, default: usize) -> usize {
    env_parse::<usize>(key).filter(|v| *v > 0).unwrap_or(default)
}

/// Reads a whole number of seconds; zero counts as unset.
fn env_secs(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}
