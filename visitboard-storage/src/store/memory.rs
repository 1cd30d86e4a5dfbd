//! In-memory store used by tests and local development.
//!
//! Behaves like the remote store as seen through [`StoreClient`] and
//! [`IdentifierCounter`]: every call passes through a [`ConnectionGate`],
//! the counter is incremented store-side under the store's own lock, and
//! reachability can be switched off to exercise connection failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use visitboard_core::{BoardResult, ConnectionError, MessageId, StoreError};

use super::{BinValue, Bins, IdentifierCounter, Record, StoreClient, BIN_COUNT};
use crate::gate::{ConnectionGate, Connector, StoreConnection};

/// Connector whose reachability is controlled by a shared switch.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    reachable: Arc<AtomicBool>,
}

impl MemoryConnector {
    pub fn new(reachable: Arc<AtomicBool>) -> Self {
        Self { reachable }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> BoardResult<MemoryConnection> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectFailed {
                reason: "store unreachable".to_string(),
            }
            .into());
        }
        Ok(MemoryConnection {
            reachable: Arc::clone(&self.reachable),
            closed: AtomicBool::new(false),
        })
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    reachable: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl StoreConnection for MemoryConnection {
    fn is_connected(&self) -> bool {
        self.reachable.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<MessageId, Bins>,
    counter: Option<Bins>,
}

/// In-memory message set plus counter record.
pub struct InMemoryStore {
    gate: Arc<ConnectionGate<MemoryConnector>>,
    reachable: Arc<AtomicBool>,
    failing: AtomicBool,
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    /// Create a reachable store. The first connection attempt starts
    /// immediately when called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_reachability(true)
    }

    /// Create a store that refuses connections until
    /// [`set_reachable(true)`](Self::set_reachable).
    pub fn unreachable() -> Self {
        Self::with_reachability(false)
    }

    fn with_reachability(reachable: bool) -> Self {
        let reachable = Arc::new(AtomicBool::new(reachable));
        Self {
            gate: ConnectionGate::start(MemoryConnector::new(Arc::clone(&reachable))),
            reachable,
            failing: AtomicBool::new(false),
            state: RwLock::new(MemoryState::default()),
        }
    }

    pub fn gate(&self) -> &ConnectionGate<MemoryConnector> {
        &self.gate
    }

    /// Simulate the store becoming reachable or unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make range queries, scans and counts fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store raw bins under `key`, bypassing the gate. Used to plant
    /// partially written records.
    pub fn insert_raw(&self, key: MessageId, bins: Bins) {
        self.write().records.insert(key, bins);
    }

    /// Number of message records held.
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failing(&self) -> Result<(), String> {
        if self.failing.load(Ordering::SeqCst) {
            Err("injected store failure".to_string())
        } else {
            Ok(())
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn put(&self, key: MessageId, bins: Bins) -> BoardResult<()> {
        self.gate.check_connection().await?;
        self.write().records.insert(key, bins);
        Ok(())
    }

    async fn delete(&self, key: MessageId) -> BoardResult<bool> {
        self.gate.check_connection().await?;
        let mut state = self.write();
        if !state.records.contains_key(&key) {
            return Ok(false);
        }
        state.records.remove(&key);
        Ok(true)
    }

    async fn query_by_range(&self, index: &str, from: i64, to: i64) -> BoardResult<Vec<Record>> {
        self.gate.check_connection().await?;

        let range_error = |reason: String| StoreError::RangeQueryFailed {
            index: index.to_string(),
            from,
            to,
            reason,
        };
        self.check_failing().map_err(range_error)?;
        if index != super::BIN_ID {
            return Err(range_error(format!("no secondary index on {index}")).into());
        }

        let state = self.read();
        let records = state
            .records
            .values()
            .filter(|bins| matches!(bins.get(index), Some(BinValue::Int(v)) if (from..=to).contains(v)))
            .map(|bins| Record::new(bins.clone()))
            .collect();
        Ok(records)
    }

    async fn scan_all(&self) -> BoardResult<Vec<Record>> {
        self.gate.check_connection().await?;
        self.check_failing()
            .map_err(|reason| StoreError::ScanFailed { reason })?;

        let state = self.read();
        Ok(state
            .records
            .values()
            .map(|bins| Record::new(bins.clone()))
            .collect())
    }

    async fn count_all(&self) -> BoardResult<usize> {
        self.gate.check_connection().await?;
        self.check_failing()
            .map_err(|reason| StoreError::CountFailed { reason })?;
        Ok(self.read().records.len())
    }

    async fn wait_for_ready(&self, timeout: Duration) -> BoardResult<()> {
        self.gate.wait_for_ready(timeout).await
    }

    fn is_connected(&self) -> bool {
        self.gate.is_connected()
    }

    fn close(&self) {
        self.gate.close();
    }
}

#[async_trait]
impl IdentifierCounter for InMemoryStore {
    async fn get_counter(&self) -> BoardResult<i64> {
        self.gate.check_connection().await?;

        let state = self.read();
        let counter = state
            .counter
            .as_ref()
            .ok_or_else(|| StoreError::CounterUnavailable {
                reason: "counter record not found".to_string(),
            })?;
        match counter.get(BIN_COUNT) {
            Some(BinValue::Int(v)) => Ok(*v),
            Some(other) => Err(StoreError::CounterUnavailable {
                reason: format!("counter bin holds {}", other.kind()),
            }
            .into()),
            None => Err(StoreError::CounterUnavailable {
                reason: "counter bin missing".to_string(),
            }
            .into()),
        }
    }

    async fn increment(&self, by: i64) -> BoardResult<i64> {
        self.gate.check_connection().await?;

        let mut state = self.write();
        let counter = state.counter.get_or_insert_with(Bins::new);
        let current = match counter.get(BIN_COUNT) {
            Some(BinValue::Int(v)) => *v,
            None => 0,
            Some(other) => {
                return Err(StoreError::CounterFailed {
                    by,
                    reason: format!("counter bin holds {}", other.kind()),
                }
                .into())
            }
        };
        let next = current + by;
        counter.insert(BIN_COUNT.to_string(), BinValue::Int(next));
        Ok(next)
    }
}
