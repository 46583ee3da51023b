//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch stamps the key with the next value of a monotonic access
/// sequence. `by_seq` orders keys from least (first) to most (last)
/// recently used, so touch, remove and eviction are all O(log n).
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Last access sequence of each key
    last_access: HashMap<String, u64>,
    /// Keys ordered by last access
    by_seq: BTreeMap<u64, String>,
    /// Next sequence number to hand out
    next_seq: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            last_access: HashMap::with_capacity(capacity),
            by_seq: BTreeMap::new(),
            next_seq: 0,
        }
    }

    // == Touch ==
    /// Marks a key as most recently used, inserting it if new.
    pub fn touch(&mut self, key: &str) {
        let seq = self.next_seq;
        self.next_seq += 1;

        match self.last_access.get_mut(key) {
            Some(prev) => {
                if let Some(owned) = self.by_seq.remove(prev) {
                    self.by_seq.insert(seq, owned);
                }
                *prev = seq;
            }
            None => {
                self.last_access.insert(key.to_string(), seq);
                self.by_seq.insert(seq, key.to_string());
            }
        }
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(seq) = self.last_access.remove(key) {
            self.by_seq.remove(&seq);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.by_seq.pop_first()?;
        self.last_access.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.by_seq.first_key_value().map(|(_, key)| key)
    }

    /// Returns the access sequence of `key`, higher meaning more recent.
    pub fn last_access(&self, key: &str) -> Option<u64> {
        self.last_access.get(key).copied()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.last_access.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_access.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.last_access.contains_key(key)
    }

    /// Forgets every key. The sequence keeps counting.
    pub fn clear(&mut self) {
        self.last_access.clear();
        self.by_seq.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_new_key() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&"key1".to_string()));
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");
        lru.touch("key1");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&"key2".to_string()));
        assert!(lru.last_access("key1") > lru.last_access("key3"));
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");

        assert_eq!(lru.evict_oldest(), Some("key1".to_string()));
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evict_oldest(), Some("key2".to_string()));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_evict_empty() {
        let mut lru = LruTracker::new();
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key2");
        lru.touch("key3");
        lru.remove("key2");
        lru.remove("nonexistent");

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains("key2"));
        assert!(lru.contains("key1"));
        assert!(lru.contains("key3"));
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");
        lru.touch("a");
        lru.touch("c");
        lru.touch("b");
        // recency is now a < c < b

        assert_eq!(lru.evict_oldest(), Some("a".to_string()));
        assert_eq!(lru.evict_oldest(), Some("c".to_string()));
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_touch_same_key_multiple_times() {
        let mut lru = LruTracker::new();

        lru.touch("key1");
        lru.touch("key1");
        lru.touch("key1");

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.evict_oldest(), Some("key1".to_string()));
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::with_capacity(4);
        lru.touch("a");
        lru.touch("b");
        lru.clear();

        assert!(lru.is_empty());
        assert_eq!(lru.peek_oldest(), None);
        lru.touch("c");
        assert_eq!(lru.peek_oldest(), Some(&"c".to_string()));
    }
}
