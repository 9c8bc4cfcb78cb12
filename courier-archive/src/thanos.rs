//! Bounded in-memory cache with emergency halving eviction.
//!
//! This is deliberately not an LRU: nothing is evicted on insert, no
//! recency metadata is maintained, and capacity is otherwise unbounded.
//! The single eviction path is an explicit memory-pressure signal that
//! removes about half of all entries in one cheap O(n) pass, trading
//! precision for low latency at the worst possible moment.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Key-object store with an emergency eviction operation.
///
/// All operations appear atomic with respect to concurrent `get`,
/// `put` and `reduce_memory` calls.
pub trait MemoryCache<K, V>: Send + Sync {
    /// Look up an object. Callers receive a shared reference; the
    /// cache stays the sole long-lived owner.
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Insert, overwriting any previous object for the key.
    fn put(&self, key: K, value: V);

    /// Drop about half of all entries; returns the survivor count.
    fn reduce_memory(&self) -> usize;
}

/// Snap: walk the map once and drop every other entry, returning how
/// many survive. For n entries, floor(n/2) remain; the choice of
/// victims ignores recency entirely.
pub fn thanos<K, V>(planet: &mut HashMap<K, V>) -> usize {
    let mut finger = 0u64;
    planet.retain(|_, _| {
        finger += 1;
        finger & 1 == 0
    });
    planet.len()
}

/// Default [`MemoryCache`] implementation backed by one mutex-guarded
/// map.
#[derive(Debug, Default)]
pub struct ThanosCache<K, V> {
    planet: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash, V> ThanosCache<K, V> {
    pub fn new() -> Self {
        Self {
            planet: Mutex::new(HashMap::new()),
        }
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.planet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> MemoryCache<K, V> for ThanosCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.planet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: K, value: V) {
        self.planet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(value));
    }

    fn reduce_memory(&self) -> usize {
        let mut planet = self.planet.lock().unwrap_or_else(PoisonError::into_inner);
        thanos(&mut planet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_get_round_trip() {
        let cache: ThanosCache<String, u32> = ThanosCache::new();
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()).as_deref(), Some(&1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn test_put_overwrites() {
        let cache: ThanosCache<String, u32> = ThanosCache::new();
        cache.put("a".to_string(), 1);
        cache.put("a".to_string(), 2);
        assert_eq!(cache.get(&"a".to_string()).as_deref(), Some(&2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reduce_memory_on_empty() {
        let cache: ThanosCache<u32, u32> = ThanosCache::new();
        assert_eq!(cache.reduce_memory(), 0);
    }

    #[test]
    fn test_reduce_memory_halves() {
        let cache: ThanosCache<u32, u32> = ThanosCache::new();
        for i in 0..10 {
            cache.put(i, i);
        }
        let survivors = cache.reduce_memory();
        assert_eq!(survivors, 5);
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn test_single_entry_does_not_survive() {
        let cache: ThanosCache<u32, u32> = ThanosCache::new();
        cache.put(7, 7);
        assert_eq!(cache.reduce_memory(), 0);
    }

    #[test]
    fn test_concurrent_access() {
        let cache: Arc<ThanosCache<u32, u32>> = Arc::new(ThanosCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        cache.put(t * 100 + i, i);
                        let _ = cache.get(&(t * 100 + i));
                        if i % 25 == 0 {
                            let _ = cache.reduce_memory();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("cache thread panicked");
        }
        // no deadlock, no panic; count only has to be consistent
        assert!(cache.len() <= 800);
    }

    proptest! {
        #[test]
        fn prop_survivors_are_about_half(n in 0usize..256) {
            let cache: ThanosCache<usize, usize> = ThanosCache::new();
            for i in 0..n {
                cache.put(i, i);
            }
            let survivors = cache.reduce_memory();
            prop_assert_eq!(survivors, n / 2);
            if n > 0 {
                prop_assert!(survivors < n);
            }
        }
    }
}
