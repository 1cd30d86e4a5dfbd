//! Board client: writes, deletes and cache-through reads over the store.
//!
//! Every write clears the whole cache. Writes and the cache-populating reads
//! share one exclusive lock, so a populate can never interleave with a clear
//! and leave an entry computed before the latest write.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use visitboard_core::{BoardResult, CacheError, Message, MessageId, StoreConfig, ValidationError};

use crate::cache::Cache;
use crate::store::{
    message_to_bins, messages_from_records, IdentifierCounter, StoreClient, BIN_ID,
};

/// Cache key for the full message list.
pub const ALL_MESSAGES_KEY: &str = "all-messages";

/// Cache key for one page of messages.
pub fn page_key(page: i64, size: i64) -> String {
    format!("messages::{page}::{size}")
}

/// Which ids a page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageWindow {
    /// Inclusive id range of a regular page.
    Ids { from: i64, to: i64 },
    /// The most recent `size` messages by id.
    Last,
}

/// Window covered by `page` of `size` messages out of `total`.
///
/// A page at or past `total / size + 1` is the last page.
pub fn page_window(page: i64, size: i64, total: i64) -> PageWindow {
    let pages = total / size + 1;
    if page >= pages {
        PageWindow::Last
    } else {
        let from = (page - 1) * size;
        PageWindow::Ids {
            from,
            to: from + size - 1,
        }
    }
}

/// Orchestrates the store, its counter and the read cache.
pub struct BoardClient<S, C: ?Sized> {
    store: Arc<S>,
    cache: Arc<C>,
    index: String,
    lock: Mutex<()>,
}

impl<S, C> BoardClient<S, C>
where
    S: StoreClient + IdentifierCounter,
    C: Cache + ?Sized,
{
    pub fn new(store: Arc<S>, cache: Arc<C>) -> Self {
        Self {
            store,
            cache,
            index: BIN_ID.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Build a board with the index named in `config` and wait up to
    /// `config.ready_timeout` for the store's first connection.
    pub async fn connect(store: Arc<S>, cache: Arc<C>, config: &StoreConfig) -> BoardResult<Self> {
        config.validate()?;
        let board = Self::new(store, cache).with_index(config.index_name.clone());
        board.wait_for_ready(config.ready_timeout).await?;
        info!(index = %board.index, "board ready");
        Ok(board)
    }

    /// Use a different secondary index for range and page queries.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Store a new message under a freshly issued id and return the id.
    ///
    /// The cache is cleared even when the write fails.
    pub async fn new_message(&self, message: Message) -> BoardResult<MessageId> {
        let _guard = self.lock.lock().await;

        let id = self.store.increment(1).await?;
        let record = message_to_bins(&message.with_id(id));
        let put = self.store.put(id, record).await;
        self.cache.clear().await;
        put?;

        info!(id, "message stored");
        Ok(id)
    }

    /// Delete a message. Returns whether it existed.
    pub async fn delete_message(&self, id: MessageId) -> BoardResult<bool> {
        let _guard = self.lock.lock().await;

        self.cache.clear().await;
        let existed = self.store.delete(id).await?;
        if existed {
            info!(id, "message deleted");
        } else {
            debug!(id, "delete of unknown message");
        }
        Ok(existed)
    }

    /// Read every message straight from the store, bypassing the cache.
    pub async fn all_messages(&self, sort_by_timestamp: bool) -> BoardResult<Vec<Message>> {
        let records = self.store.scan_all().await?;
        let mut messages = messages_from_records(&records);
        if sort_by_timestamp {
            Message::sort_by_timestamp(&mut messages);
        }
        Ok(messages)
    }

    /// Read every message through the cache.
    ///
    /// A hit is returned in whatever order it was cached with.
    pub async fn all_messages_cache(&self, sort_by_timestamp: bool) -> BoardResult<Vec<Message>> {
        let guard = self.lock.lock().await;
        self.all_messages_cached(&guard, sort_by_timestamp).await
    }

    /// Messages whose ids fall in `[from, to]`. Never cached.
    pub async fn get_messages_with_range(&self, from: i64, to: i64) -> BoardResult<Vec<Message>> {
        let records = self.store.query_by_range(&self.index, from, to).await?;
        Ok(messages_from_records(&records))
    }

    /// One page of messages in id order, served through the cache.
    ///
    /// Pages past the end yield the most recent `size` messages. A page at
    /// least as large as the board is served from the full-list entry.
    pub async fn get_messages_page(&self, page: i64, size: i64) -> BoardResult<Vec<Message>> {
        if page < 1 || size < 1 {
            return Err(ValidationError::InvalidPage { page, size }.into());
        }

        let guard = self.lock.lock().await;

        let total = self.store.count_all().await? as i64;
        if size >= total {
            return self.all_messages_cached(&guard, false).await;
        }

        let key = page_key(page, size);
        if let Some(messages) = self.cached(&key).await? {
            debug!(key = %key, "page cache hit");
            return Ok(messages);
        }

        let window = page_window(page, size, total);
        debug!(page, size, total, ?window, "page cache miss");
        let messages = match window {
            PageWindow::Ids { from, to } => {
                let records = self.store.query_by_range(&self.index, from, to).await?;
                let mut messages = messages_from_records(&records);
                messages.sort_by_key(|m| m.id);
                messages
            }
            PageWindow::Last => self.last_messages(size).await?,
        };
        self.populate(&key, &messages).await;
        Ok(messages)
    }

    /// Number of stored messages.
    pub async fn messages_count(&self) -> BoardResult<usize> {
        self.store.count_all().await
    }

    /// Wait for the store's first connection.
    pub async fn wait_for_ready(&self, timeout: Duration) -> BoardResult<()> {
        self.store.wait_for_ready(timeout).await
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    pub fn close(&self) {
        self.store.close();
    }

    /// The `size` highest-id messages, in id order.
    ///
    /// Ids have gaps after deletes, so the range below the counter widens
    /// until it holds `size` messages or reaches id 0.
    async fn last_messages(&self, size: i64) -> BoardResult<Vec<Message>> {
        let last_id = self.store.get_counter().await?;
        let mut span = size;
        loop {
            let from = last_id.saturating_sub(span - 1).max(0);
            let records = self.store.query_by_range(&self.index, from, last_id).await?;
            let mut messages = messages_from_records(&records);
            if messages.len() as i64 >= size || from == 0 {
                messages.sort_by_key(|m| m.id);
                let skip = messages.len().saturating_sub(size as usize);
                return Ok(messages.split_off(skip));
            }
            span = span.saturating_mul(2);
        }
    }

    // Caller must hold `self.lock`.
    async fn all_messages_cached(
        &self,
        _guard: &MutexGuard<'_, ()>,
        sort_by_timestamp: bool,
    ) -> BoardResult<Vec<Message>> {
        if let Some(messages) = self.cached(ALL_MESSAGES_KEY).await? {
            debug!(key = ALL_MESSAGES_KEY, "cache hit");
            return Ok(messages);
        }

        let messages = self.all_messages(sort_by_timestamp).await?;
        self.populate(ALL_MESSAGES_KEY, &messages).await;
        Ok(messages)
    }

    async fn cached(&self, key: &str) -> BoardResult<Option<Vec<Message>>> {
        let Some(bytes) = self.cache.get(key).await else {
            return Ok(None);
        };
        let messages = serde_json::from_slice(&bytes).map_err(|e| CacheError::TypeMismatch {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(messages))
    }

    async fn populate(&self, key: &str, messages: &[Message]) {
        let bytes = match serde_json::to_vec(messages) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, error = %err, "failed to encode cache entry");
                return;
            }
        };
        let cost = bytes.len();
        if !self.cache.set(key, bytes, cost).await {
            warn!(key, cost, "cache declined entry");
        }
    }
}
