//! Cache trait and usage statistics.
//!
//! The cache is an optimization layer only. A miss is never an error and a
//! rejected write must not fail the surrounding operation.

use async_trait::async_trait;

/// Key-value cache of encoded board reads.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up `key`. Returns `None` on a miss.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key` with the given cost.
    ///
    /// Returns `false` when the cache declines the entry, e.g. under
    /// capacity pressure. Callers log and carry on.
    async fn set(&self, key: &str, value: Vec<u8>, cost: usize) -> bool;

    /// Drop every entry.
    async fn clear(&self);

    /// Current usage statistics.
    async fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Total cost of the entries currently in cache.
    pub cost: u64,
    /// Number of writes the cache declined.
    pub rejections: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of whole-cache clears.
    pub clears: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
