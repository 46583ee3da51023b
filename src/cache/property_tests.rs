//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the bounds and bookkeeping of both cache types
//! under arbitrary operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::{LruCache, LruConfig, MemorySize, TtlCache};

// == Test Configuration ==
const TEST_CAPACITY: usize = 50;
const TEST_MAX_MEMORY: usize = 4 * 1024;
const TEST_TTL: Duration = Duration::from_secs(300);

fn test_cache(capacity: usize, max_memory: usize) -> LruCache<String> {
    LruCache::new(LruConfig {
        capacity,
        max_memory,
        default_ttl: TEST_TTL,
    })
}

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{1,3}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,300}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses reported by stats match what `get` returned.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let cache = test_cache(TEST_CAPACITY, TEST_MAX_MEMORY);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => cache.set(key, value),
                CacheOp::Get { key } => match cache.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.current_size, cache.len(), "Size mismatch");
    }

    // Entry count never exceeds capacity, and resident memory never exceeds
    // the limit unless a single entry alone is larger than it.
    #[test]
    fn prop_bounds_enforced(ops in prop::collection::vec(cache_op_strategy(), 1..200)) {
        let capacity = 8;
        let max_memory = 512;
        let cache = test_cache(capacity, max_memory);

        for op in ops {
            let mut last_set_size = 0;
            match op {
                CacheOp::Set { key, value } => {
                    last_set_size = value.memory_size();
                    cache.set(key, value);
                }
                CacheOp::Get { key } => {
                    cache.get(&key);
                }
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
            }

            prop_assert!(cache.len() <= capacity, "len {} > capacity {}", cache.len(), capacity);
            let memory = cache.memory_usage();
            prop_assert!(
                memory <= max_memory || (cache.len() == 1 && memory == last_set_size),
                "memory {} over limit {} with {} entries",
                memory,
                max_memory,
                cache.len()
            );
        }
    }

    // Resident memory always equals the sum of the sizes of live values.
    #[test]
    fn prop_memory_accounting(ops in prop::collection::vec(cache_op_strategy(), 1..120)) {
        let cache = test_cache(usize::MAX, usize::MAX);
        let mut model = std::collections::HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    model.insert(key.clone(), value.len());
                    cache.set(key, value);
                }
                CacheOp::Get { key } => {
                    cache.get(&key);
                }
                CacheOp::Delete { key } => {
                    model.remove(&key);
                    cache.delete(&key);
                }
            }
        }

        let expected: usize = model.values().sum();
        prop_assert_eq!(cache.memory_usage(), expected);
        prop_assert_eq!(cache.len(), model.len());
    }

    // Filling to capacity and inserting one more evicts exactly the entry
    // that was used least recently.
    #[test]
    fn prop_lru_eviction_order(
        keys in prop::collection::hash_set(key_strategy(), 3..10),
        touch in any::<prop::sample::Index>(),
        new_key in key_strategy()
    ) {
        prop_assume!(!keys.contains(&new_key));
        let keys: Vec<String> = keys.into_iter().collect();
        let cache = test_cache(keys.len(), TEST_MAX_MEMORY * 16);

        for key in &keys {
            cache.set(key.clone(), format!("value_{key}"));
        }

        // Touching a key moves it to the back of the eviction order.
        let touched = touch.index(keys.len());
        cache.get(&keys[touched]);
        let expected_victim = if touched == 0 { &keys[1] } else { &keys[0] };

        cache.set(new_key.clone(), "new".to_string());

        prop_assert_eq!(cache.len(), keys.len());
        prop_assert!(cache.peek(expected_victim).is_none(), "{} should be evicted", expected_victim);
        prop_assert!(cache.peek(&keys[touched]).is_some());
        prop_assert!(cache.peek(&new_key).is_some());
        prop_assert_eq!(cache.stats().evictions, 1);
    }

    // The most recent write to a key is the one that is read back.
    #[test]
    fn prop_last_write_wins(
        key in key_strategy(),
        values in prop::collection::vec(value_strategy(), 1..10)
    ) {
        let ttl_cache = TtlCache::new(TEST_TTL);
        let lru_cache = test_cache(TEST_CAPACITY, usize::MAX);

        for value in &values {
            ttl_cache.set(key.clone(), value.clone());
            lru_cache.set(key.clone(), value.clone());
        }

        let last = values.last().cloned();
        prop_assert_eq!(ttl_cache.get(&key), last.clone());
        prop_assert_eq!(lru_cache.get(&key), last);
        prop_assert_eq!(ttl_cache.size(), 1);
        prop_assert_eq!(lru_cache.len(), 1);
    }

    // Deleted keys are gone from both cache types; others are untouched.
    #[test]
    fn prop_delete_only_removes_target(
        keys in prop::collection::hash_set(key_strategy(), 2..20),
        victim in any::<prop::sample::Index>()
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let victim = &keys[victim.index(keys.len())];
        let ttl_cache = TtlCache::new(TEST_TTL);
        let lru_cache = test_cache(TEST_CAPACITY, usize::MAX);

        for key in &keys {
            ttl_cache.set(key.clone(), key.clone());
            lru_cache.set(key.clone(), key.clone());
        }

        prop_assert!(ttl_cache.delete(victim));
        prop_assert!(lru_cache.delete(victim));

        let remaining: HashSet<&String> = keys.iter().filter(|k| *k != victim).collect();
        for key in &remaining {
            prop_assert_eq!(ttl_cache.get(key), Some((*key).clone()));
            prop_assert_eq!(lru_cache.get(key), Some((*key).clone()));
        }
        prop_assert_eq!(ttl_cache.get(victim), None);
        prop_assert_eq!(lru_cache.get(victim), None);
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    #[test]
    fn prop_ttl_expiration_behavior(key in key_strategy(), value in value_strategy()) {
        let ttl_cache = TtlCache::new(TEST_TTL);
        let lru_cache = test_cache(TEST_CAPACITY, usize::MAX);
        let ttl = Duration::from_millis(30);

        ttl_cache.set_with_ttl(key.clone(), value.clone(), ttl);
        lru_cache.set_with_ttl(key.clone(), value.clone(), ttl);
        prop_assert_eq!(ttl_cache.get(&key), Some(value.clone()));
        prop_assert_eq!(lru_cache.get(&key), Some(value));

        std::thread::sleep(Duration::from_millis(60));

        prop_assert_eq!(ttl_cache.get(&key), None);
        prop_assert_eq!(lru_cache.get(&key), None);
        prop_assert_eq!(lru_cache.memory_usage(), 0);
    }
}
