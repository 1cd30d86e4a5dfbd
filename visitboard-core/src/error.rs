//! Error types for visitor board operations

use crate::MessageId;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reaching the remote store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Store is not connected")]
    NotConnected,

    #[error("Store connection attempt already in progress")]
    AlreadyConnecting,

    #[error("Store connection failed: {reason}")]
    ConnectFailed { reason: String },

    #[error("Store not ready after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Failures reported by the store for a specific operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Put failed for key {key}: {reason}")]
    PutFailed { key: MessageId, reason: String },

    #[error("Delete failed for key {key}: {reason}")]
    DeleteFailed { key: MessageId, reason: String },

    #[error("Range query on {index} [{from}, {to}] failed: {reason}")]
    RangeQueryFailed {
        index: String,
        from: i64,
        to: i64,
        reason: String,
    },

    #[error("Scan failed: {reason}")]
    ScanFailed { reason: String },

    #[error("Count failed: {reason}")]
    CountFailed { reason: String },

    #[error("Counter unavailable: {reason}")]
    CounterUnavailable { reason: String },

    #[error("Counter increment by {by} failed: {reason}")]
    CounterFailed { by: i64, reason: String },

    #[error("Invalid store key {key}: {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cached value under {key} has unexpected shape: {reason}")]
    TypeMismatch { key: String, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Invalid page request: page {page}, size {size}")]
    InvalidPage { page: i64, size: i64 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all visitor board errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl BoardError {
    /// Whether the failure came from the store being unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, BoardError::Connection(_))
    }
}

/// Result type alias for visitor board operations.
pub type BoardResult<T> = Result<T, BoardError>;

// =============================================================================
// TESTS
// =============================================================================
