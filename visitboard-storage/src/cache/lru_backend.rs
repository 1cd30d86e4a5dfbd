//! Cost-aware LRU cache used in production.
//!
//! Capacity is a total cost budget rather than an entry count. Inserting an
//! entry evicts least-recently-used entries until the new one fits; an entry
//! costing more than the whole budget is declined.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use lru::LruCache;
use tracing::debug;
use visitboard_core::{BoardResult, CacheConfig};

use super::traits::{Cache, CacheStats};

struct Entry {
    value: Vec<u8>,
    cost: usize,
}

struct LruState {
    entries: LruCache<String, Entry>,
    cost: usize,
    stats: CacheStats,
}

/// LRU cache bounded by total entry cost.
pub struct LruCostCache {
    state: Mutex<LruState>,
    max_cost: usize,
}

impl LruCostCache {
    /// Create a cache from validated configuration.
    pub fn new(config: &CacheConfig) -> BoardResult<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(LruState {
                entries: LruCache::unbounded(),
                cost: 0,
                stats: CacheStats::default(),
            }),
            max_cost: config.max_cost,
        })
    }

    pub fn max_cost(&self) -> usize {
        self.max_cost
    }

    fn lock(&self) -> MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cache for LruCostCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.lock();
        let value = state.entries.get(key).map(|entry| entry.value.clone());
        if value.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        value
    }

    async fn set(&self, key: &str, value: Vec<u8>, cost: usize) -> bool {
        let mut state = self.lock();

        if cost > self.max_cost {
            state.stats.rejections += 1;
            debug!(key, cost, max_cost = self.max_cost, "cache entry exceeds budget");
            return false;
        }

        if let Some(old) = state.entries.pop(key) {
            state.cost -= old.cost;
        }

        while state.cost + cost > self.max_cost {
            match state.entries.pop_lru() {
                Some((evicted, entry)) => {
                    state.cost -= entry.cost;
                    state.stats.evictions += 1;
                    debug!(key = %evicted, cost = entry.cost, "evicted cache entry");
                }
                None => break,
            }
        }

        state.entries.put(key.to_string(), Entry { value, cost });
        state.cost += cost;
        true
    }

    async fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.cost = 0;
        state.stats.clears += 1;
    }

    async fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entry_count: state.entries.len() as u64,
            cost: state.cost as u64,
            ..state.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_cost: usize) -> LruCostCache {
        LruCostCache::new(&CacheConfig::new().with_max_cost(max_cost)).unwrap()
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(LruCostCache::new(&CacheConfig::new().with_max_cost(0)).is_err());
    }

    #[tokio::test]
    async fn test_get_set_clear() {
        let cache = cache(100);
        assert_eq!(cache.get("a").await, None);

        assert!(cache.set("a", vec![1, 2, 3], 3).await);
        assert_eq!(cache.get("a").await, Some(vec![1, 2, 3]));

        cache.clear().await;
        assert_eq!(cache.get("a").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.cost, 0);
        assert_eq!(stats.clears, 1);
        assert_eq!(stats.evictions, 0);
    }

    #[tokio::test]
    async fn test_oversized_entry_declined() {
        let cache = cache(10);
        assert!(!cache.set("big", vec![0; 11], 11).await);
        assert_eq!(cache.get("big").await, None);
        assert_eq!(cache.stats().await.rejections, 1);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let cache = cache(10);
        assert!(cache.set("a", vec![0; 4], 4).await);
        assert!(cache.set("b", vec![0; 4], 4).await);
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").await.is_some());

        assert!(cache.set("c", vec![0; 4], 4).await);

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.cost, 8);
    }

    #[tokio::test]
    async fn test_replacing_key_releases_old_cost() {
        let cache = cache(10);
        assert!(cache.set("a", vec![0; 8], 8).await);
        assert!(cache.set("a", vec![0; 9], 9).await);

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.cost, 9);
        assert_eq!(stats.evictions, 0);
    }
}
