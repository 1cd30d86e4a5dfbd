//! VISITBOARD Core - Entity Types
//!
//! Pure data structures shared by the storage layer and the HTTP handlers.
//! This crate performs no I/O.

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;

pub use config::{CacheConfig, StoreConfig};
pub use error::{
    BoardError, BoardResult, CacheError, ConfigError, ConnectionError, StoreError,
    ValidationError,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Message identifier issued by the store-owned counter.
///
/// Unique and strictly increasing for the lifetime of the store. Gaps appear
/// after deletes.
pub type MessageId = i64;

/// Unix timestamp in seconds.
pub type UnixSeconds = i64;

/// Author recorded when a visitor leaves the name blank.
pub const DEFAULT_AUTHOR: &str = "anon";

/// Current wall-clock time as unix seconds.
pub fn now_unix() -> UnixSeconds {
    Utc::now().timestamp()
}

// ============================================================================
// MESSAGE
// ============================================================================

/// A single post on the visitor board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Assigned at write time, never supplied by the client.
    pub id: MessageId,
    pub author: String,
    pub message: String,
    pub timestamp: UnixSeconds,
}

impl Message {
    /// Build a message with an explicit author and timestamp.
    ///
    /// The id stays zero until the board assigns one.
    pub fn new(author: impl Into<String>, message: impl Into<String>, timestamp: UnixSeconds) -> Self {
        Self {
            id: 0,
            author: author.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Build a message from visitor input, stamped with the current time.
    ///
    /// A blank message is rejected. A missing or blank author falls back to
    /// [`DEFAULT_AUTHOR`].
    pub fn compose(author: Option<&str>, message: &str) -> BoardResult<Self> {
        if message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let author = author
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_AUTHOR);

        Ok(Self::new(author, message, now_unix()))
    }

    /// Return a copy carrying the given id.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Stable ascending sort by timestamp.
    pub fn sort_by_timestamp(messages: &mut [Message]) {
        messages.sort_by_key(|m| m.timestamp);
    }
}

// =============================================================================
// TESTS
// =============================================================================
