//! VISITBOARD Test Utilities
//!
//! Shared test infrastructure for the VISITBOARD workspace:
//! - Recording cache wrapper for asserting cache traffic
//! - Proptest generators for messages
//! - Fixtures for seeded boards
//! - Custom assertions for board results

// Re-export test doubles from their source crate
pub use visitboard_storage::{BoardClient, Cache, CacheStats, InMemoryStore, MapCache};

// Re-export core types for convenience
pub use visitboard_core::{
    BoardError, BoardResult, CacheError, ConnectionError, Message, MessageId, StoreError,
    ValidationError, DEFAULT_AUTHOR,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
///
/// Honors `RUST_LOG`; output goes through the test harness capture.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// RECORDING CACHE
// ============================================================================

/// Snapshot of the calls a [`RecordingCache`] has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCalls {
    pub gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub rejected_sets: u64,
    pub clears: u64,
}

/// Cache wrapper that counts traffic and can be told to decline writes.
pub struct RecordingCache<C> {
    inner: C,
    decline_sets: AtomicBool,
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    rejected_sets: AtomicU64,
    clears: AtomicU64,
}

impl<C: Cache> RecordingCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            decline_sets: AtomicBool::new(false),
            gets: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            rejected_sets: AtomicU64::new(0),
            clears: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Make every subsequent `set` return `false` without storing.
    pub fn decline_sets(&self, decline: bool) {
        self.decline_sets.store(decline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CacheCalls {
        CacheCalls {
            gets: self.gets.load(Ordering::SeqCst),
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            sets: self.sets.load(Ordering::SeqCst),
            rejected_sets: self.rejected_sets.load(Ordering::SeqCst),
            clears: self.clears.load(Ordering::SeqCst),
        }
    }

    /// Zero all counters.
    pub fn reset_calls(&self) {
        for counter in [
            &self.gets,
            &self.hits,
            &self.misses,
            &self.sets,
            &self.rejected_sets,
            &self.clears,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<C: Cache> Cache for RecordingCache<C> {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let value = self.inner.get(key).await;
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        } else {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }
        value
    }

    async fn set(&self, key: &str, value: Vec<u8>, cost: usize) -> bool {
        self.sets.fetch_add(1, Ordering::SeqCst);
        let accepted =
            !self.decline_sets.load(Ordering::SeqCst) && self.inner.set(key, value, cost).await;
        if !accepted {
            self.rejected_sets.fetch_add(1, Ordering::SeqCst);
        }
        accepted
    }

    async fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await;
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for board entities.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_author() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(DEFAULT_AUTHOR.to_string()),
            "[a-zA-Z][a-zA-Z0-9_]{0,19}".prop_map(|s| s),
        ]
    }

    pub fn arb_message_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9][a-zA-Z0-9 .,!?]{0,139}".prop_map(|s| s)
    }

    /// Unix seconds between 2020-01-01 and 2030-01-01.
    pub fn arb_timestamp() -> impl Strategy<Value = i64> {
        1_577_836_800i64..1_893_456_000i64
    }

    /// A message without an id, as submitted by a visitor.
    pub fn arb_message() -> impl Strategy<Value = Message> {
        (arb_author(), arb_message_text(), arb_timestamp())
            .prop_map(|(author, message, timestamp)| Message::new(author, message, timestamp))
    }

    pub fn arb_messages(max: usize) -> impl Strategy<Value = Vec<Message>> {
        prop::collection::vec(arb_message(), 0..=max)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built boards and messages for common scenarios.

    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Board wired to the in-memory store and a recording map cache.
    pub type TestBoard = BoardClient<InMemoryStore, RecordingCache<MapCache>>;

    /// Upper bound for the in-memory store to report ready.
    pub const READY_TIMEOUT: Duration = Duration::from_secs(1);

    /// Message posted by `author` at `timestamp`.
    pub fn message_at(author: &str, timestamp: i64) -> Message {
        Message::new(author, format!("hello from {author}"), timestamp)
    }

    /// A board with an empty, connected store.
    pub async fn empty_board() -> TestBoard {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(RecordingCache::new(MapCache::new()));
        let board = BoardClient::new(store, cache);
        board
            .wait_for_ready(READY_TIMEOUT)
            .await
            .expect("in-memory store never became ready");
        board
    }

    /// A board holding `messages`, written in order, with cache counters
    /// reset afterwards.
    pub async fn seeded_board(messages: Vec<Message>) -> TestBoard {
        let board = empty_board().await;
        for message in messages {
            board
                .new_message(message)
                .await
                .expect("seeding the board failed");
        }
        board.cache().reset_calls();
        board
    }

    /// A board holding `count` messages one minute apart.
    pub async fn board_with(count: usize) -> TestBoard {
        let messages = (0..count)
            .map(|i| message_at("anon", 1_700_000_000 + 60 * i as i64))
            .collect();
        seeded_board(messages).await
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for board results.

    use super::*;

    /// Assert that a BoardResult is a connection error.
    #[track_caller]
    pub fn assert_connection_error<T: std::fmt::Debug>(result: &BoardResult<T>) {
        match result {
            Err(BoardError::Connection(_)) => {}
            other => panic!("Expected Connection error, got: {:?}", other),
        }
    }

    /// Assert that a BoardResult is a cache type mismatch for `key`.
    #[track_caller]
    pub fn assert_cache_type_mismatch<T: std::fmt::Debug>(result: &BoardResult<T>, key: &str) {
        match result {
            Err(BoardError::Cache(CacheError::TypeMismatch { key: k, .. })) => {
                assert_eq!(k, key, "Wrong key in TypeMismatch error");
            }
            other => panic!("Expected TypeMismatch error for {key}, got: {:?}", other),
        }
    }

    /// Assert that message ids are strictly increasing in slice order.
    #[track_caller]
    pub fn assert_ids_strictly_increasing(messages: &[Message]) {
        for pair in messages.windows(2) {
            assert!(
                pair[0].id < pair[1].id,
                "ids not strictly increasing: {} then {}",
                pair[0].id,
                pair[1].id
            );
        }
    }

    /// Assert that ids match `expected`, in order.
    #[track_caller]
    pub fn assert_ids(messages: &[Message], expected: &[MessageId]) {
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, expected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_recording_cache_counts_traffic() {
        let cache = RecordingCache::new(MapCache::new());
        assert!(cache.get("k").await.is_none());
        assert!(cache.set("k", vec![1], 1).await);
        assert!(cache.get("k").await.is_some());
        cache.clear().await;

        assert_eq!(
            cache.calls(),
            CacheCalls {
                gets: 2,
                hits: 1,
                misses: 1,
                sets: 1,
                rejected_sets: 0,
                clears: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_recording_cache_declines_sets() {
        let cache = RecordingCache::new(MapCache::new());
        cache.decline_sets(true);

        assert!(!cache.set("k", vec![1], 1).await);
        assert!(cache.inner().is_empty());
        assert_eq!(cache.calls().rejected_sets, 1);
    }

    proptest! {
        #[test]
        fn prop_generated_messages_are_postable(message in generators::arb_message()) {
            prop_assert!(!message.message.trim().is_empty());
            prop_assert!(!message.author.is_empty());
            prop_assert_eq!(message.id, 0);
        }
    }
}
