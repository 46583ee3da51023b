//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support, and
//! the byte-size estimate used by memory-bounded caches.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

// == Memory Size ==
/// Estimated resident size of a cached value, in bytes.
pub trait MemorySize {
    fn memory_size(&self) -> usize;
}

impl MemorySize for String {
    fn memory_size(&self) -> usize {
        self.len()
    }
}

impl MemorySize for &'static str {
    fn memory_size(&self) -> usize {
        self.len()
    }
}

impl MemorySize for Vec<u8> {
    fn memory_size(&self) -> usize {
        self.len()
    }
}

impl MemorySize for Bytes {
    fn memory_size(&self) -> usize {
        self.len()
    }
}

impl<T: MemorySize + ?Sized> MemorySize for Arc<T> {
    fn memory_size(&self) -> usize {
        (**self).memory_size()
    }
}

macro_rules! fixed_memory_size {
    ($($t:ty),*) => {
        $(impl MemorySize for $t {
            fn memory_size(&self) -> usize {
                std::mem::size_of::<$t>()
            }
        })*
    };
}

fixed_memory_size!(i32, u32, i64, u64, usize, f32, f64, bool);

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Estimated size of `value` in bytes
    pub size_bytes: usize,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `size_bytes` - Estimated resident size of the value
    /// * `ttl` - Lifetime; `None` or a zero duration means no expiration
    pub fn new(value: V, size_bytes: usize, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| now.saturating_add(ttl.as_millis() as u64));

        Self {
            value,
            size_bytes,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is visible only while the current time is strictly before
    /// its expiration time; at `now == expires_at` it is already expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Same as [`is_expired`](Self::is_expired) against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            Duration::from_millis(expires.saturating_sub(now))
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
