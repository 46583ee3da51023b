//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of a cache's performance and occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted by the LRU policy
    pub evictions: u64,
    /// Current number of entries in the cache
    pub current_size: usize,
    /// Current estimated payload bytes
    pub current_memory: usize,
    /// Configured entry limit
    pub capacity: usize,
    /// Configured memory limit in bytes
    pub max_memory: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stat Counters ==
/// Lock-free hit/miss/eviction counters shared by a cache instance.
#[derive(Debug, Default)]
pub struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl StatCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Builds a [`CacheStats`] from the counters plus occupancy figures.
    pub fn snapshot(
        &self,
        current_size: usize,
        current_memory: usize,
        capacity: usize,
        max_memory: usize,
    ) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            current_size,
            current_memory,
            capacity,
            max_memory,
        }
    }
}
