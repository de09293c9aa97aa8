//! Bounded cache for remote assets
//!
//! Generic key-to-payload cache with a hard capacity. All access goes
//! through one mutex so the evict-then-insert sequence never interleaves
//! between callers.

mod assets;

pub use assets::AssetFetcher;

use parking_lot::Mutex;
use std::collections::HashMap;

/// Default capacity for asset caches
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// A capacity-bounded key-value cache.
///
/// When full, inserting a new key evicts the first key in the map's current
/// iteration order. That is deliberately not LRU: there is no access-time
/// tracking, just single-entry eviction that is deterministic per map
/// instance.
pub struct BoundedCache<V> {
    inner: Mutex<CacheInner<V>>,
}

struct CacheInner<V> {
    map: HashMap<String, V>,
    max_size: usize,
}

impl<V: Clone> BoundedCache<V> {
    /// Create a cache holding at most `max_size` entries
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                max_size: max_size.max(1),
            }),
        }
    }

    /// Get a clone of the payload for `key`, if cached
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().map.get(key).cloned()
    }

    /// Insert a payload, evicting one existing entry first when at capacity.
    ///
    /// Overwriting an existing key never evicts.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut inner = self.inner.lock();

        if !inner.map.contains_key(&key) && inner.map.len() >= inner.max_size {
            if let Some(evict) = inner.map.keys().next().cloned() {
                inner.map.remove(&evict);
            }
        }

        inner.map.insert(key, value);
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.inner.lock().map.clear();
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }
}

impl<V: Clone> Default for BoundedCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_insert() {
        let cache = BoundedCache::new(10);
        assert!(cache.get("a").is_none());

        cache.insert("a", 1u32);
        assert_eq!(cache.get("a"), Some(1));

        cache.insert("a", 2u32);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let cache = BoundedCache::new(100);
        for i in 0..101 {
            cache.insert(format!("key-{i}"), i);
        }
        // Exactly max_size entries resident after max_size + 1 inserts
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_eviction_removes_single_entry() {
        let cache = BoundedCache::new(3);
        cache.insert("a", 1u32);
        cache.insert("b", 2u32);
        cache.insert("c", 3u32);
        cache.insert("d", 4u32);

        assert_eq!(cache.len(), 3);
        // The newest key is always resident
        assert_eq!(cache.get("d"), Some(4));
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let cache = BoundedCache::new(2);
        cache.insert("a", 1u32);
        cache.insert("b", 2u32);

        cache.insert("a", 10u32);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache = BoundedCache::new(10);
        cache.insert("a", 1u32);
        cache.insert("b", 2u32);
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let cache = BoundedCache::new(0);
        cache.insert("a", 1u32);
        assert_eq!(cache.len(), 1);
        cache.insert("b", 2u32);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }
}
