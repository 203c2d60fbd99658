//! TTL caches for prepared render data.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

/// TTL and capacity for one cache instance.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 30_000,
            max_entries: 4096,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    written_at_ms: u64,
    ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.written_at_ms) >= self.ttl_ms
    }
}

/// Generic keyed cache with per-entry TTL and a hard entry cap.
///
/// Expired entries are removed on read and by periodic [`sweep`] calls;
/// when the cap is hit, the oldest entries (by write time) are evicted.
///
/// [`sweep`]: RenderCache::sweep
#[derive(Debug)]
pub struct RenderCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    default_ttl_ms: u64,
    max_entries: usize,
}

impl<K: Eq + Hash + Clone, V> RenderCache<K, V> {
    pub fn new(default_ttl_ms: u64, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl_ms,
            max_entries: max_entries.max(1),
        }
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self::new(config.ttl_ms, config.max_entries)
    }

    pub fn get(&mut self, key: &K, now_ms: u64) -> Option<&V> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now_ms)) {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn insert(&mut self, key: K, value: V, now_ms: u64) {
        self.insert_with_ttl(key, value, now_ms, self.default_ttl_ms);
    }

    pub fn insert_with_ttl(&mut self, key: K, value: V, now_ms: u64, ttl_ms: u64) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                written_at_ms: now_ms,
                ttl_ms,
            },
        );
    }

    /// Drop all expired entries. Returns how many were removed.
    pub fn sweep(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "cache sweep");
        }
        removed
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.written_at_ms)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache: RenderCache<&str, u32> = RenderCache::new(100, 16);
        cache.insert("a", 1, 0);

        assert_eq!(cache.get(&"a", 50), Some(&1));
        assert_eq!(cache.get(&"a", 150), None);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let mut cache: RenderCache<&str, u32> = RenderCache::new(100, 16);
        cache.insert("old", 1, 0);
        cache.insert("new", 2, 90);

        assert_eq!(cache.sweep(120), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new", 120), Some(&2));
    }

    #[test]
    fn cap_evicts_oldest_write() {
        let mut cache: RenderCache<u32, u32> = RenderCache::new(10_000, 2);
        cache.insert(1, 1, 0);
        cache.insert(2, 2, 10);
        cache.insert(3, 3, 20);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1, 30), None);
        assert_eq!(cache.get(&3, 30), Some(&3));
    }
}
