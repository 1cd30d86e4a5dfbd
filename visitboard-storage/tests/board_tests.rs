//! Board client behavior against the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use visitboard_core::{CacheConfig, StoreConfig, StoreError};
use visitboard_storage::{
    message_to_bins, page_key, BinValue, BoardClient, Bins, Cache, LruCostCache, StoreClient,
    ALL_MESSAGES_KEY, BIN_ID, BIN_MESSAGE,
};
use visitboard_test_utils::assertions::{
    assert_cache_type_mismatch, assert_connection_error, assert_ids,
    assert_ids_strictly_increasing,
};
use visitboard_test_utils::fixtures::{
    board_with, empty_board, message_at, seeded_board, READY_TIMEOUT,
};
use visitboard_test_utils::{
    init_tracing, BoardError, ConnectionError, InMemoryStore, MapCache, Message, RecordingCache,
    ValidationError,
};

const HOUR: i64 = 3600;

// ============================================================================
// WRITES
// ============================================================================

#[tokio::test]
async fn test_new_message_assigns_sequential_ids() {
    init_tracing();
    let board = empty_board().await;

    let first = board.new_message(message_at("ada", 100)).await.unwrap();
    let second = board.new_message(message_at("bob", 50)).await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 2);
    assert_eq!(board.messages_count().await.unwrap(), 2);

    let stored = board.get_messages_with_range(1, 1).await.unwrap();
    assert_eq!(stored, vec![message_at("ada", 100).with_id(1)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_get_unique_increasing_ids() {
    init_tracing();
    let board = Arc::new(empty_board().await);

    let mut handles = Vec::new();
    for task in 0..8 {
        let board = Arc::clone(&board);
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..25 {
                let id = board
                    .new_message(message_at("writer", task * 100 + i))
                    .await
                    .unwrap();
                ids.push(id);
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let ids = handle.await.unwrap();
        // Ids issued to one task are increasing in issue order.
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for id in ids {
            assert!(seen.insert(id), "duplicate id {id}");
        }
    }

    assert_eq!(seen.len(), 200);
    assert_eq!(seen.iter().copied().max(), Some(200));
    assert_eq!(board.messages_count().await.unwrap(), 200);
}

#[tokio::test]
async fn test_new_message_clears_cache() {
    let board = board_with(3).await;
    board.all_messages_cache(false).await.unwrap();
    board.get_messages_page(1, 2).await.unwrap();
    assert!(!board.cache().inner().is_empty());

    board.new_message(message_at("carol", 1)).await.unwrap();

    assert!(board.cache().inner().is_empty());
    assert_eq!(board.cache().calls().clears, 1);
}

#[tokio::test]
async fn test_new_message_on_unreachable_store_fails() {
    let board = board_with(2).await;

    board.store().set_reachable(false);
    let result = board.new_message(message_at("dave", 1)).await;
    assert_connection_error(&result);

    board.store().set_reachable(true);
    assert_eq!(board.messages_count().await.unwrap(), 2);
    assert_eq!(board.new_message(message_at("dave", 2)).await.unwrap(), 3);
}

#[tokio::test]
async fn test_delete_message_reports_existence() {
    let board = board_with(3).await;
    board.all_messages_cache(false).await.unwrap();

    assert!(!board.delete_message(42).await.unwrap());
    assert!(board.cache().inner().is_empty());

    let before = board.messages_count().await.unwrap();
    assert!(board.delete_message(2).await.unwrap());
    assert_eq!(board.messages_count().await.unwrap(), before - 1);
    assert!(!board.delete_message(2).await.unwrap());
}

#[tokio::test]
async fn test_ids_are_not_reused_after_delete() {
    let board = board_with(3).await;
    assert!(board.delete_message(3).await.unwrap());

    let id = board.new_message(message_at("eve", 1)).await.unwrap();
    assert_eq!(id, 4);
}

// ============================================================================
// FULL READS
// ============================================================================

#[tokio::test]
async fn test_all_messages_sorts_by_timestamp() {
    let t = 1_700_000_000;
    let board = seeded_board(vec![
        message_at("a", t - HOUR),
        message_at("b", t),
        message_at("c", t - 2 * HOUR),
        message_at("d", t - 5 * 24 * HOUR),
        message_at("e", t - 120),
    ])
    .await;

    let sorted = board.all_messages(true).await.unwrap();
    let timestamps: Vec<i64> = sorted.iter().map(|m| m.timestamp).collect();
    assert_eq!(
        timestamps,
        vec![t - 5 * 24 * HOUR, t - 2 * HOUR, t - HOUR, t - 120, t]
    );
    assert_ids(&sorted, &[4, 3, 1, 5, 2]);

    let unsorted = board.all_messages(false).await.unwrap();
    assert_ids(&unsorted, &[1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_all_messages_never_touches_cache() {
    let board = board_with(3).await;
    board.all_messages(true).await.unwrap();
    board.all_messages(false).await.unwrap();

    assert_eq!(board.cache().calls().gets, 0);
    assert!(board.cache().inner().is_empty());
}

#[tokio::test]
async fn test_all_messages_cache_hit_keeps_cached_order() {
    let board =
        seeded_board(vec![message_at("a", 30), message_at("b", 10), message_at("c", 20)]).await;

    let first = board.all_messages_cache(true).await.unwrap();
    assert_ids(&first, &[2, 3, 1]);
    assert_eq!(board.cache().calls().misses, 1);
    assert_eq!(board.cache().calls().sets, 1);

    // Asking for unsorted output still returns the sorted cached entry.
    let second = board.all_messages_cache(false).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(board.cache().calls().hits, 1);
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_an_error() {
    let board = board_with(2).await;
    board
        .cache()
        .inner()
        .insert_raw(ALL_MESSAGES_KEY, b"{\"not\":\"a list\"}".to_vec());

    let result = board.all_messages_cache(false).await;
    assert_cache_type_mismatch(&result, ALL_MESSAGES_KEY);
}

#[tokio::test]
async fn test_declined_cache_write_does_not_fail_read() {
    let board = board_with(3).await;
    board.cache().decline_sets(true);

    let messages = board.all_messages_cache(false).await.unwrap();
    assert_eq!(messages.len(), 3);
    let page = board.get_messages_page(2, 2).await.unwrap();
    assert_ids(&page, &[2, 3]);

    assert_eq!(board.cache().calls().rejected_sets, 2);
    assert!(board.cache().inner().is_empty());
}

#[tokio::test]
async fn test_partial_record_reads_as_zero_values() {
    let board = empty_board().await;
    let mut bins = Bins::new();
    bins.insert(BIN_ID.to_string(), BinValue::Int(7));
    bins.insert(BIN_MESSAGE.to_string(), BinValue::from("half written"));
    board.store().insert_raw(7, bins);

    let messages = board.all_messages(false).await.unwrap();
    assert_eq!(
        messages,
        vec![Message {
            id: 7,
            author: String::new(),
            message: "half written".to_string(),
            timestamp: 0,
        }]
    );
}

// ============================================================================
// RANGE AND PAGES
// ============================================================================

#[tokio::test]
async fn test_range_read_is_inclusive_and_uncached() {
    let board = board_with(6).await;

    let messages = board.get_messages_with_range(2, 4).await.unwrap();
    assert_ids(&messages, &[2, 3, 4]);
    assert!(board.get_messages_with_range(4, 2).await.unwrap().is_empty());
    assert_eq!(board.cache().calls().gets, 0);
    assert_eq!(board.cache().calls().sets, 0);
}

#[tokio::test]
async fn test_page_miss_then_hit() {
    let board = board_with(5).await;

    let first = board.get_messages_page(2, 2).await.unwrap();
    assert_ids(&first, &[2, 3]);
    let calls = board.cache().calls();
    assert_eq!((calls.misses, calls.sets), (1, 1));
    assert!(board.cache().inner().contains(&page_key(2, 2)));

    let second = board.get_messages_page(2, 2).await.unwrap();
    assert_eq!(second, first);
    let calls = board.cache().calls();
    assert_eq!((calls.hits, calls.sets), (1, 1));
}

#[tokio::test]
async fn test_page_beyond_end_returns_last_page() {
    let board = board_with(5).await;

    let far = board.get_messages_page(10, 2).await.unwrap();
    let last = board.get_messages_page(3, 2).await.unwrap();

    assert_eq!(far, last);
    assert_ids(&far, &[4, 5]);
}

#[tokio::test]
async fn test_first_page_skips_unissued_id_zero() {
    let board = board_with(5).await;
    let page = board.get_messages_page(1, 2).await.unwrap();
    assert_ids(&page, &[1]);
}

#[tokio::test]
async fn test_page_covering_everything_uses_all_entry() {
    let board = board_with(4).await;

    let page = board.get_messages_page(1, 4).await.unwrap();
    let all = board.all_messages_cache(false).await.unwrap();

    assert_eq!(page, all);
    assert_eq!(page.len(), 4);
    assert!(board.cache().inner().contains(ALL_MESSAGES_KEY));
    assert!(!board.cache().inner().contains(&page_key(1, 4)));

    let bigger = board.get_messages_page(3, 100).await.unwrap();
    assert_eq!(bigger, all);
}

#[tokio::test]
async fn test_page_on_empty_board() {
    let board = empty_board().await;
    assert!(board.get_messages_page(1, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_page_rejected() {
    let board = board_with(3).await;

    for (page, size) in [(0, 2), (1, 0), (-1, 5), (2, -3)] {
        let err = board.get_messages_page(page, size).await.unwrap_err();
        assert_eq!(err, BoardError::Validation(ValidationError::InvalidPage { page, size }));
    }
    assert_eq!(board.cache().calls().gets, 0);
}

#[tokio::test]
async fn test_pages_are_stale_free_after_write() {
    let board = board_with(5).await;
    let before = board.get_messages_page(10, 2).await.unwrap();
    assert_ids(&before, &[4, 5]);

    board.new_message(message_at("late", 1)).await.unwrap();

    let after = board.get_messages_page(10, 2).await.unwrap();
    assert_ids(&after, &[5, 6]);
    assert_ids_strictly_increasing(&after);
}

#[tokio::test]
async fn test_last_page_after_delete_holds_full_page() {
    let board = board_with(5).await;
    assert!(board.delete_message(4).await.unwrap());

    let far = board.get_messages_page(10, 2).await.unwrap();
    assert_ids(&far, &[3, 5]);
    // 4 / 2 + 1 = 3 pages, so page 3 is the same last page.
    assert_eq!(board.get_messages_page(3, 2).await.unwrap(), far);
}

#[tokio::test]
async fn test_last_page_after_deleting_newest() {
    let board = board_with(6).await;
    assert!(board.delete_message(6).await.unwrap());
    assert!(board.delete_message(5).await.unwrap());
    assert!(board.delete_message(3).await.unwrap());

    // 3 left (1, 2, 4); 3 / 2 + 1 = 2 pages.
    let last = board.get_messages_page(2, 2).await.unwrap();
    assert_ids(&last, &[2, 4]);
    let far = board.get_messages_page(50, 2).await.unwrap();
    assert_eq!(far, last);
}

#[tokio::test]
async fn test_lru_cache_backs_the_board() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(LruCostCache::new(&CacheConfig::new().with_max_cost(64 * 1024)).unwrap());
    let board = BoardClient::new(store, Arc::clone(&cache));
    board.wait_for_ready(READY_TIMEOUT).await.unwrap();

    for i in 0..5 {
        board.new_message(message_at("lru", i)).await.unwrap();
    }
    board.get_messages_page(2, 2).await.unwrap();
    board.get_messages_page(2, 2).await.unwrap();

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entry_count, 1);
    assert!(stats.cost > 0);
    assert_eq!(stats.clears, 5);
}

// ============================================================================
// CONNECTION
// ============================================================================

#[tokio::test]
async fn test_connect_applies_store_config() {
    let config = StoreConfig {
        index_name: "author".to_string(),
        ..StoreConfig::default()
    };
    let board = BoardClient::connect(
        Arc::new(InMemoryStore::new()),
        Arc::new(MapCache::new()),
        &config,
    )
    .await
    .unwrap();
    assert!(board.is_connected());

    // The in-memory store only indexes `id`, so the configured name reaches it.
    let err = board.get_messages_with_range(1, 2).await.unwrap_err();
    assert!(matches!(
        err,
        BoardError::Store(StoreError::RangeQueryFailed { ref index, .. }) if index == "author"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_connect_waits_for_ready_timeout() {
    let config = StoreConfig {
        ready_timeout: Duration::from_millis(300),
        ..StoreConfig::default()
    };
    let result = BoardClient::connect(
        Arc::new(InMemoryStore::unreachable()),
        Arc::new(MapCache::new()),
        &config,
    )
    .await;

    assert_eq!(
        result.err(),
        Some(BoardError::Connection(ConnectionError::Timeout {
            timeout: Duration::from_millis(300)
        }))
    );
}

#[tokio::test]
async fn test_connect_rejects_invalid_config() {
    let config = StoreConfig {
        index_name: String::new(),
        ..StoreConfig::default()
    };
    let result = BoardClient::connect(
        Arc::new(InMemoryStore::new()),
        Arc::new(MapCache::new()),
        &config,
    )
    .await;
    assert!(matches!(result, Err(BoardError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_ready_times_out_on_unreachable_store() {
    let store = Arc::new(InMemoryStore::unreachable());
    let board = BoardClient::new(store, Arc::new(MapCache::new()));

    let err = board.wait_for_ready(Duration::from_millis(200)).await.unwrap_err();
    assert_eq!(
        err,
        BoardError::Connection(ConnectionError::Timeout {
            timeout: Duration::from_millis(200)
        })
    );
    assert!(!board.is_connected());
}

#[tokio::test]
async fn test_wait_for_ready_after_late_connect() {
    let store = Arc::new(InMemoryStore::unreachable());
    let board = BoardClient::new(Arc::clone(&store), Arc::new(MapCache::new()));
    assert!(board.wait_for_ready(Duration::from_millis(20)).await.is_err());

    store.set_reachable(true);
    // First successful call connects and fires readiness.
    assert_eq!(board.messages_count().await.unwrap(), 0);
    board.wait_for_ready(Duration::from_millis(20)).await.unwrap();
    assert!(board.is_connected());
}

#[tokio::test]
async fn test_connection_errors_propagate_from_every_operation() {
    let board = board_with(2).await;
    board.store().set_reachable(false);

    assert_connection_error(&board.new_message(message_at("x", 1)).await);
    assert_connection_error(&board.delete_message(1).await);
    assert_connection_error(&board.all_messages(false).await);
    assert_connection_error(&board.all_messages_cache(false).await);
    assert_connection_error(&board.get_messages_with_range(1, 2).await);
    assert_connection_error(&board.get_messages_page(1, 1).await);
    assert_connection_error(&board.messages_count().await);
}

#[tokio::test]
async fn test_close_then_reconnect_on_next_call() {
    let board = board_with(1).await;
    board.close();
    assert!(!board.is_connected());

    assert_eq!(board.messages_count().await.unwrap(), 1);
    assert!(board.is_connected());
}

#[tokio::test]
async fn test_store_put_is_visible_through_board() {
    let board = empty_board().await;
    let message = message_at("direct", 5).with_id(9);
    board.store().put(9, message_to_bins(&message)).await.unwrap();

    assert_eq!(board.get_messages_with_range(9, 9).await.unwrap(), vec![message]);
}

#[tokio::test]
async fn test_boxed_cache_is_accepted() {
    let store = Arc::new(InMemoryStore::new());
    let cache: Arc<dyn Cache> = Arc::new(RecordingCache::new(MapCache::new()));
    let board = BoardClient::new(store, cache);
    board.wait_for_ready(READY_TIMEOUT).await.unwrap();

    board.new_message(message_at("dyn", 1)).await.unwrap();
    assert_eq!(board.all_messages_cache(false).await.unwrap().len(), 1);
}
