//! Store client abstraction over the remote key-value store.
//!
//! Message records live in one set, keyed by their id, with a secondary
//! numeric index on the `id` bin. The identifier counter is a separate record
//! kept in its own set.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use visitboard_core::{BoardResult, MessageId};

pub mod convert;
pub mod memory;

#[cfg(feature = "aerospike")]
pub mod aerospike;

pub use convert::{message_from_record, message_to_bins, messages_from_records};
pub use memory::{InMemoryStore, MemoryConnection, MemoryConnector};

#[cfg(feature = "aerospike")]
pub use self::aerospike::{AerospikeConnection, AerospikeConnector, AerospikeStore};

/// Bin holding the message id; also the name of the secondary index.
pub const BIN_ID: &str = "id";
pub const BIN_AUTHOR: &str = "author";
pub const BIN_MESSAGE: &str = "message";
pub const BIN_TIMESTAMP: &str = "timestamp";
/// Bin of the counter record.
pub const BIN_COUNT: &str = "count";

/// A single field value in a stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum BinValue {
    Int(i64),
    Float(f64),
    Str(String),
    Blob(Vec<u8>),
    Nil,
}

impl BinValue {
    /// Short type name used in decode warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            BinValue::Int(_) => "int",
            BinValue::Float(_) => "float",
            BinValue::Str(_) => "string",
            BinValue::Blob(_) => "blob",
            BinValue::Nil => "nil",
        }
    }
}

impl From<i64> for BinValue {
    fn from(v: i64) -> Self {
        BinValue::Int(v)
    }
}

impl From<&str> for BinValue {
    fn from(v: &str) -> Self {
        BinValue::Str(v.to_string())
    }
}

impl From<String> for BinValue {
    fn from(v: String) -> Self {
        BinValue::Str(v)
    }
}

/// Schemaless field map of one record.
pub type Bins = HashMap<String, BinValue>;

/// A record returned by queries and scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub bins: Bins,
}

impl Record {
    pub fn new(bins: Bins) -> Self {
        Self { bins }
    }
}

/// Record operations against the message set.
///
/// Every operation first confirms the store connection.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Insert or fully replace the record stored under `key`.
    async fn put(&self, key: MessageId, bins: Bins) -> BoardResult<()>;

    /// Delete the record under `key`. Returns whether it existed.
    async fn delete(&self, key: MessageId) -> BoardResult<bool>;

    /// All records whose `index` bin lies in `[from, to]`.
    async fn query_by_range(&self, index: &str, from: i64, to: i64) -> BoardResult<Vec<Record>>;

    /// Every message record in the set, in store order.
    async fn scan_all(&self) -> BoardResult<Vec<Record>>;

    /// Number of message records, without reading bin data.
    async fn count_all(&self) -> BoardResult<usize>;

    /// Wait until the first connection to the store has been made.
    async fn wait_for_ready(&self, timeout: Duration) -> BoardResult<()>;

    fn is_connected(&self) -> bool;

    fn close(&self);
}

/// Store-owned atomic counter that issues message ids.
#[async_trait]
pub trait IdentifierCounter: Send + Sync {
    /// Current counter value.
    async fn get_counter(&self) -> BoardResult<i64>;

    /// Atomically add `by` on the store and return the new value.
    async fn increment(&self, by: i64) -> BoardResult<i64>;
}
