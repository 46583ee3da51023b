//! LRU Cache Store Module
//!
//! Capacity- and memory-bounded cache combining HashMap storage with LRU
//! tracking and TTL expiration. One instance is created per data category,
//! each with its own limits.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::stats::StatCounters;
use crate::cache::{CacheEntry, CacheStats, LruTracker, MemorySize};
use crate::config::LruGroupConfig;

/// Entry limit applied when a zero capacity is configured.
pub const DEFAULT_LRU_CAPACITY: usize = 10_000;
/// Memory limit applied when a zero limit is configured.
pub const DEFAULT_LRU_MAX_MEMORY: usize = 100 * 1024 * 1024;
/// TTL applied when a zero default TTL is configured.
pub const DEFAULT_LRU_TTL: Duration = Duration::from_secs(5 * 60);

// == LRU Config ==
/// Construction parameters of an [`LruCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LruConfig {
    /// Maximum number of resident entries
    pub capacity: usize,
    /// Maximum resident bytes, as estimated by [`MemorySize`]
    pub max_memory: usize,
    /// TTL used by [`LruCache::set`]
    pub default_ttl: Duration,
}

impl LruConfig {
    /// Replaces zero limits with the crate defaults.
    fn normalized(self) -> Self {
        Self {
            capacity: if self.capacity == 0 {
                DEFAULT_LRU_CAPACITY
            } else {
                self.capacity
            },
            max_memory: if self.max_memory == 0 {
                DEFAULT_LRU_MAX_MEMORY
            } else {
                self.max_memory
            },
            default_ttl: if self.default_ttl.is_zero() {
                DEFAULT_LRU_TTL
            } else {
                self.default_ttl
            },
        }
    }
}

impl From<&LruGroupConfig> for LruConfig {
    fn from(group: &LruGroupConfig) -> Self {
        Self {
            capacity: group.capacity,
            max_memory: group.max_memory,
            default_ttl: group.ttl,
        }
    }
}

// == Internal State ==
#[derive(Debug)]
struct LruState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    lru: LruTracker,
    memory: usize,
}

impl<V> LruState<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.memory -= entry.size_bytes;
        Some(entry)
    }
}

// == LRU Cache ==
/// Memory-bounded LRU cache with per-entry TTL.
///
/// All bounds are enforced on insertion: after a `set`, the least recently
/// used entries are evicted until both the entry count and the resident
/// memory fit. The entry just written is never evicted by its own
/// insertion, so a single value larger than `max_memory` stays resident on
/// its own until it is replaced, expires, or is pushed out by the next write.
#[derive(Debug)]
pub struct LruCache<V> {
    state: Mutex<LruState<V>>,
    counters: StatCounters,
    config: LruConfig,
}

impl<V: Clone + MemorySize> LruCache<V> {
    // == Constructor ==
    /// Creates a new cache. Zero limits fall back to the crate defaults.
    pub fn new(config: LruConfig) -> Self {
        let config = config.normalized();
        Self {
            state: Mutex::new(LruState {
                entries: HashMap::with_capacity(config.capacity.min(1024)),
                lru: LruTracker::with_capacity(config.capacity.min(1024)),
                memory: 0,
            }),
            counters: StatCounters::new(),
            config,
        }
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> LruConfig {
        self.config
    }

    // == Get ==
    /// Retrieves a value and marks it most recently used.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = current_timestamp_ms();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            None => {
                self.counters.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            state.remove(key);
            self.counters.record_miss();
            return None;
        }

        state.lru.touch(key);
        self.counters.record_hit();
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Peek ==
    /// Retrieves a live value without touching recency or statistics.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = current_timestamp_ms();
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Returns true if `key` holds a live entry. Does not touch recency.
    pub fn contains(&self, key: &str) -> bool {
        let now = current_timestamp_ms();
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    // == Set ==
    /// Stores a value with the cache's default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Stores a value with an explicit TTL (`Duration::ZERO` = no expiry).
    ///
    /// Overwriting an existing key replaces value, size and expiry and makes
    /// it most recently used.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let size = value.memory_size();
        let entry = CacheEntry::new(value, size, Some(ttl));

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(old) = state.entries.insert(key.clone(), entry) {
            state.memory -= old.size_bytes;
        }
        state.memory += size;
        state.lru.touch(&key);

        while state.entries.len() > self.config.capacity || state.memory > self.config.max_memory
        {
            match state.lru.peek_oldest() {
                Some(oldest) if *oldest != key => {}
                _ => break,
            }
            let Some(victim) = state.lru.evict_oldest() else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&victim) {
                state.memory -= evicted.size_bytes;
                self.counters.record_eviction();
            }
        }
    }

    // == Delete ==
    /// Removes an entry. Returns true if it was resident.
    pub fn delete(&self, key: &str) -> bool {
        self.state.lock().remove(key).is_some()
    }

    // == Clear ==
    /// Drops every entry. Statistics counters are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.lru.clear();
        state.memory = 0;
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    // == Length ==
    /// Returns the number of resident entries, including expired ones not yet reaped.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Returns the resident payload bytes.
    pub fn memory_usage(&self) -> usize {
        self.state.lock().memory
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let (len, memory) = {
            let state = self.state.lock();
            (state.entries.len(), state.memory)
        };
        self.counters
            .snapshot(len, memory, self.config.capacity, self.config.max_memory)
    }
}
