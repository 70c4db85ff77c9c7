//! Bounded TTL + LRU cache for memoized evidence fetches.
//!
//! An explicit cache behind an interface, not a module-level mutable map:
//! entries expire after their TTL and the least-recently-used entry is
//! evicted once the capacity is reached. Evidence fetches are memoized by
//! URL for 24 hours.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A thread-safe cache with per-entry TTL and LRU eviction.
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    ttl: Duration,
    capacity: usize,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Access order, least recent first. Touched keys move to the back.
    order: Vec<K>,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<K: Clone + Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Create a cache with the given TTL and capacity.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Look up a key, refreshing its recency. Expired entries miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().ok()?;
        let expired = inner
            .entries
            .get(key)
            .is_some_and(|e| e.inserted_at.elapsed() > self.ttl);
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        let value = inner.entries.get(key).map(|e| e.value.clone())?;
        inner.order.retain(|k| k != key);
        inner.order.push(key.clone());
        Some(value)
    }

    /// Insert a value, evicting the least-recently-used entry when full.
    pub fn insert(&self, key: K, value: V) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.entries.len() >= self.capacity {
            if !inner.order.is_empty() {
                let evicted = inner.order.remove(0);
                inner.entries.remove(&evicted);
            }
        }
        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        inner.order.push(key);
    }

    /// Current entry count (expired entries included until touched).
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60), 4);
        cache.insert("a".to_owned(), 1);
        assert_eq!(cache.get(&"a".to_owned()), Some(1));
        assert_eq!(cache.get(&"b".to_owned()), None);
    }

    #[test]
    fn lru_evicts_least_recent() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_owned(), 1);
        cache.insert("b".to_owned(), 2);
        // Touch "a" so "b" becomes least recent.
        assert_eq!(cache.get(&"a".to_owned()), Some(1));
        cache.insert("c".to_owned(), 3);
        assert_eq!(cache.get(&"b".to_owned()), None, "b should be evicted");
        assert_eq!(cache.get(&"a".to_owned()), Some(1));
        assert_eq!(cache.get(&"c".to_owned()), Some(3));
    }

    #[test]
    fn ttl_expires_entries() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_millis(0), 4);
        cache.insert("a".to_owned(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a".to_owned()), None);
    }

    #[test]
    fn reinsert_updates_value() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_owned(), 1);
        cache.insert("a".to_owned(), 2);
        assert_eq!(cache.get(&"a".to_owned()), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
