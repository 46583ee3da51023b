//! Cache Module
//!
//! In-process caching: an unbounded TTL cache for small global slots, a
//! capacity- and memory-bounded LRU cache per data category, and the
//! read-through [`CacheService`] that sits in front of the repository.

mod entry;
mod lru;
mod service;
mod stats;
mod store;
mod ttl;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{CacheEntry, MemorySize};
pub use lru::LruTracker;
pub use service::{
    article_detail_key, CacheService, CacheServiceStats, KEY_ARTICLE_CATEGORIES,
    KEY_ARTICLE_DETAIL_PREFIX, KEY_ARTICLE_TAGS, KEY_ONLINE_COUNT, KEY_USER_PREFIX,
};
pub use stats::CacheStats;
pub use store::{
    LruCache, LruConfig, DEFAULT_LRU_CAPACITY, DEFAULT_LRU_MAX_MEMORY, DEFAULT_LRU_TTL,
};
pub use ttl::TtlCache;
