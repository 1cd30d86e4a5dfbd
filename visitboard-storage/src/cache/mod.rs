//! Cache layer for board reads.
//!
//! Entries hold JSON-encoded message lists keyed by the read that produced
//! them. The board clears the whole cache on every write, so an entry never
//! outlives the data it was computed from.

pub mod lru_backend;
pub mod map_backend;
pub mod traits;

pub use lru_backend::LruCostCache;
pub use map_backend::MapCache;
pub use traits::{Cache, CacheStats};
