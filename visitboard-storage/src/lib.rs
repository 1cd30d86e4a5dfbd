//! VISITBOARD Storage - Store Client, Cache and Board Orchestration
//!
//! The store traits have an in-memory implementation for tests and an
//! Aerospike implementation behind the `aerospike` feature.

pub mod board;
pub mod cache;
pub mod gate;
pub mod store;

pub use board::{page_key, page_window, BoardClient, PageWindow, ALL_MESSAGES_KEY};
pub use cache::{Cache, CacheStats, LruCostCache, MapCache};
pub use gate::{ConnectionGate, Connector, GateState, StoreConnection};
pub use store::{
    message_from_record, message_to_bins, messages_from_records, BinValue, Bins,
    IdentifierCounter, InMemoryStore, MemoryConnection, MemoryConnector, Record, StoreClient,
    BIN_AUTHOR, BIN_COUNT, BIN_ID, BIN_MESSAGE, BIN_TIMESTAMP,
};

#[cfg(feature = "aerospike")]
pub use store::{AerospikeConnection, AerospikeConnector, AerospikeStore};
