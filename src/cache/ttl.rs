//! TTL Cache Module
//!
//! Unbounded expiring key-value cache. Entries disappear only through TTL
//! expiry, explicit delete, or clear; callers are responsible for keeping
//! the key space bounded.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::stats::StatCounters;
use crate::cache::{CacheEntry, CacheStats};

// == TTL Cache ==
/// Thread-safe expiring cache.
///
/// Reads take the shared lock. An expired entry is never returned; it is
/// removed lazily by the read that finds it or by [`TtlCache::cleanup_expired`].
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    counters: StatCounters,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    // == Constructor ==
    /// Creates a cache whose `set` uses `default_ttl` (`Duration::ZERO` = no expiry).
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: StatCounters::new(),
            default_ttl,
        }
    }

    // == Set ==
    /// Stores a value with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores a value with an explicit TTL. A zero TTL means the entry lives
    /// until it is deleted or the cache is cleared.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, 0, Some(ttl));
        self.entries.write().insert(key.into(), entry);
    }

    // == Get ==
    /// Retrieves a live value. Absent and expired keys are indistinguishable.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = current_timestamp_ms();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => {
                    self.counters.record_miss();
                    return None;
                }
                Some(entry) if !entry.is_expired_at(now) => {
                    self.counters.record_hit();
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a concurrent set may have refreshed it.
        let mut entries = self.entries.write();
        let now = current_timestamp_ms();
        match entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.counters.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.counters.record_miss();
                None
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    // == Delete ==
    /// Removes an entry. Returns true if one was present (live or not).
    pub fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    // == Clear ==
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    // == Size ==
    /// Returns the number of live entries.
    pub fn size(&self) -> usize {
        let now = current_timestamp_ms();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    // == Stats ==
    /// Returns hit/miss counters and the live entry count. The cache has no
    /// size or memory bound, so `capacity` and `max_memory` are reported as 0.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.size(), 0, 0, 0)
    }
}
