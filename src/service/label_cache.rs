//! Short-lived cache for the listings used only to resolve display labels.

use std::hash::Hash;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Map whose entries expire `ttl` after insertion. A zero `ttl` caches nothing.
pub struct TtlCache<K, V> {
    ttl: Duration,
    store: DashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            store: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Returns the cached value, or `None` if it is missing or expired.
    pub fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let entry = self.store.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }
        self.store.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.insert(1u32, "a");
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert(1u32, "a");
        assert_eq!(cache.get(&1), Some("a"));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for key in 0..50u32 {
                        cache.insert(key, i);
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }

        assert_eq!(cache.len(), 50);
    }
}
