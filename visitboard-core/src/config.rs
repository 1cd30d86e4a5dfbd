//! Store and cache configuration.
//!
//! Values are read from environment variables with defaults suitable for a
//! single local store node.

use crate::error::ConfigError;
use std::time::Duration;

// ============================================================================
// STORE CONFIGURATION
// ============================================================================

/// Connection and layout settings for the remote message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Seed hosts, `host:port` comma-separated.
    pub hosts: String,
    /// Store namespace holding the board.
    pub namespace: String,
    /// Set (collection) holding message records.
    pub set_name: String,
    /// Set holding the identifier counter record, kept apart so scans of
    /// the message set never see it.
    pub counter_set: String,
    /// Key of the identifier counter record.
    pub counter_key: String,
    /// Secondary numeric index used for range queries.
    pub index_name: String,
    /// How long startup waits for the first connection.
    pub ready_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hosts: "127.0.0.1:3000".to_string(),
            namespace: "visitboard".to_string(),
            set_name: "messages".to_string(),
            counter_set: "counters".to_string(),
            counter_key: "message-counter".to_string(),
            index_name: "id".to_string(),
            ready_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Create a store configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VISITBOARD_STORE_HOSTS` (default: 127.0.0.1:3000)
    /// - `VISITBOARD_STORE_NAMESPACE` (default: visitboard)
    /// - `VISITBOARD_STORE_SET` (default: messages)
    /// - `VISITBOARD_COUNTER_SET` (default: counters)
    /// - `VISITBOARD_COUNTER_KEY` (default: message-counter)
    /// - `VISITBOARD_INDEX_NAME` (default: id)
    /// - `VISITBOARD_READY_TIMEOUT_MS` (default: 5000)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unparseable numbers fall back
    /// to the default.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            hosts: lookup("VISITBOARD_STORE_HOSTS").unwrap_or(defaults.hosts),
            namespace: lookup("VISITBOARD_STORE_NAMESPACE").unwrap_or(defaults.namespace),
            set_name: lookup("VISITBOARD_STORE_SET").unwrap_or(defaults.set_name),
            counter_set: lookup("VISITBOARD_COUNTER_SET").unwrap_or(defaults.counter_set),
            counter_key: lookup("VISITBOARD_COUNTER_KEY").unwrap_or(defaults.counter_key),
            index_name: lookup("VISITBOARD_INDEX_NAME").unwrap_or(defaults.index_name),
            ready_timeout: lookup("VISITBOARD_READY_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.ready_timeout),
        }
    }

    /// Reject settings the store client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("hosts", &self.hosts),
            ("namespace", &self.namespace),
            ("set_name", &self.set_name),
            ("counter_set", &self.counter_set),
            ("counter_key", &self.counter_key),
            ("index_name", &self.index_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Capacity settings for the production message cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total cost the cache may hold. Cost is the encoded size in bytes.
    pub max_cost: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cost: 8 * 1024 * 1024, // 8 MB
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache configuration from `VISITBOARD_CACHE_MAX_COST`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_cost = lookup("VISITBOARD_CACHE_MAX_COST")
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::default().max_cost);
        Self { max_cost }
    }

    /// Set the maximum total cost.
    pub fn with_max_cost(mut self, max_cost: usize) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cost == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_cost".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
