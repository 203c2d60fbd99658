//! Layout-result caching.
//!
//! A converged layout is stored keyed by `(node_count, edge_count, force
//! parameters)`; re-running the same graph with the same physics reuses the
//! prior positions instead of resimulating.

use std::collections::HashMap;

use notegraph_core::Vec2;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::params::ForceParams;

/// Hashable cache key. Float parameters go through `OrderedFloat` so the
/// key derives `Eq`/`Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    node_count: usize,
    edge_count: usize,
    params: [OrderedFloat<f32>; 7],
}

impl LayoutKey {
    pub fn new(node_count: usize, edge_count: usize, params: &ForceParams) -> Self {
        Self {
            node_count,
            edge_count,
            params: params.cache_fields().map(OrderedFloat),
        }
    }
}

/// Bounded store of converged layouts, evicting the oldest entry first.
#[derive(Debug, Default)]
pub struct LayoutCache {
    entries: HashMap<LayoutKey, Vec<Vec2>>,
    insertion_order: Vec<LayoutKey>,
    max_entries: usize,
}

impl LayoutCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &LayoutKey) -> Option<&Vec<Vec2>> {
        self.entries.get(key)
    }

    pub fn store(&mut self, key: LayoutKey, positions: Vec<Vec2>) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, positions);
            return;
        }
        while self.entries.len() >= self.max_entries {
            let oldest = self.insertion_order.remove(0);
            self.entries.remove(&oldest);
            debug!("layout cache full, evicted oldest entry");
        }
        self.insertion_order.push(key.clone());
        self.entries.insert(key, positions);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_requires_matching_params() {
        let mut cache = LayoutCache::new(4);
        let params = ForceParams::default();
        let key = LayoutKey::new(5, 4, &params);
        cache.store(key.clone(), vec![Vec2::ZERO; 5]);

        assert!(cache.get(&key).is_some());

        let different = ForceParams {
            gravity: 0.9,
            ..params
        };
        assert!(cache.get(&LayoutKey::new(5, 4, &different)).is_none());
        assert!(cache.get(&LayoutKey::new(6, 4, &params)).is_none());
    }

    #[test]
    fn oldest_entry_evicted_at_capacity() {
        let mut cache = LayoutCache::new(2);
        let params = ForceParams::default();
        for n in 0..3 {
            cache.store(LayoutKey::new(n, 0, &params), Vec::new());
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&LayoutKey::new(0, 0, &params)).is_none());
        assert!(cache.get(&LayoutKey::new(2, 0, &params)).is_some());
    }
}
