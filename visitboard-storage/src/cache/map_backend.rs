//! Unbounded map cache for tests. Ignores cost and never evicts.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::traits::{Cache, CacheStats};

#[derive(Default)]
pub struct MapCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    stats: RwLock<CacheStats>,
}

impl MapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is present, without touching hit/miss counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Overwrite `key` with raw bytes, bypassing statistics.
    pub fn insert_raw(&self, key: &str, value: Vec<u8>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

#[async_trait]
impl Cache for MapCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let value = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        value
    }

    async fn set(&self, key: &str, value: Vec<u8>, _cost: usize) -> bool {
        self.insert_raw(key, value);
        true
    }

    async fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.stats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clears += 1;
    }

    async fn stats(&self) -> CacheStats {
        let stats = self.stats.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entry_count: self.len() as u64,
            ..stats.clone()
        }
    }
}
