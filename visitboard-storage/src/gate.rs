//! Readiness gate for the asynchronously established store connection.
//!
//! The gate owns the connection handle. Every store operation goes through
//! [`ConnectionGate::check_connection`], which returns the live handle or
//! makes a single connection attempt. Readiness fires exactly once, the first
//! time a connection succeeds, and stays set for the life of the gate. A
//! dropped connection is noticed lazily by the next check.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use visitboard_core::{BoardResult, ConnectionError};

/// Establishes connections to the remote store.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: StoreConnection;

    /// Open a new connection. Implementations report failures as
    /// [`ConnectionError::ConnectFailed`].
    async fn connect(&self) -> BoardResult<Self::Connection>;
}

/// A handle produced by a [`Connector`].
pub trait StoreConnection: Send + Sync + 'static {
    /// Whether the handle can still reach the store.
    fn is_connected(&self) -> bool;

    /// Release the handle.
    fn close(&self);
}

/// Lifecycle of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Disconnected,
    Connecting,
    Connected,
}

/// Holds the "connecting" flag for the duration of one attempt.
struct ConnectingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ConnectingGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Connection lifecycle owner with a one-shot readiness signal.
pub struct ConnectionGate<C: Connector> {
    connector: C,
    connection: RwLock<Option<Arc<C::Connection>>>,
    connecting: AtomicBool,
    ready: watch::Sender<bool>,
}

impl<C: Connector> ConnectionGate<C> {
    /// Create a gate without attempting a connection.
    pub fn new(connector: C) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            connector,
            connection: RwLock::new(None),
            connecting: AtomicBool::new(false),
            ready,
        }
    }

    /// Create a gate and kick off one background connection attempt.
    ///
    /// Never blocks. Outside a tokio runtime the attempt is deferred to the
    /// first [`check_connection`](Self::check_connection).
    pub fn start(connector: C) -> Arc<Self> {
        let gate = Arc::new(Self::new(connector));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let background = Arc::clone(&gate);
                handle.spawn(async move {
                    if let Err(err) = background.check_connection().await {
                        warn!(error = %err, "initial store connection failed");
                    }
                });
            }
            Err(_) => debug!("no async runtime, store connection deferred to first use"),
        }

        gate
    }

    /// Return a live connection, connecting if necessary.
    ///
    /// Only one attempt is in flight at a time; a caller arriving during an
    /// attempt gets [`ConnectionError::AlreadyConnecting`] instead of waiting.
    pub async fn check_connection(&self) -> BoardResult<Arc<C::Connection>> {
        if let Some(conn) = self.current() {
            if conn.is_connected() {
                return Ok(conn);
            }
            debug!("store connection dropped, reconnecting");
        }

        let _guard = ConnectingGuard::try_acquire(&self.connecting)
            .ok_or(ConnectionError::AlreadyConnecting)?;

        let conn = match self.connector.connect().await {
            Ok(conn) => Arc::new(conn),
            Err(err) => {
                warn!(error = %err, "store connection attempt failed");
                return Err(err);
            }
        };

        let previous = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::clone(&conn));
        if let Some(previous) = previous {
            previous.close();
            debug!("closed replaced store connection");
        }

        let first = self.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
        if first {
            info!("store connection ready");
        } else {
            info!("store connection re-established");
        }

        Ok(conn)
    }

    /// Block until the gate is ready or `timeout` elapses.
    pub async fn wait_for_ready(&self, timeout: Duration) -> BoardResult<()> {
        let mut rx = self.ready.subscribe();
        // Bound to a local so the borrow of `rx` ends before it drops.
        let result = match tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            // The sender lives in `self`, so the channel cannot close under us.
            Ok(Err(_)) => Err(ConnectionError::NotConnected.into()),
            Err(_) => Err(ConnectionError::Timeout { timeout }.into()),
        };
        result
    }

    /// Whether the readiness signal has fired.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Lifecycle of the readiness signal, not link health.
    ///
    /// Stays `Connected` once ready, including after [`close`](Self::close)
    /// and during a reconnect. Use [`is_connected`](Self::is_connected) for
    /// the current link.
    pub fn state(&self) -> GateState {
        if self.is_ready() {
            GateState::Connected
        } else if self.connecting.load(Ordering::Acquire) {
            GateState::Connecting
        } else {
            GateState::Disconnected
        }
    }

    /// Whether a live connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.current().map(|c| c.is_connected()).unwrap_or(false)
    }

    /// Close and drop the held connection, if any.
    pub fn close(&self) {
        let conn = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(conn) = conn {
            conn.close();
            info!("store connection closed");
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    fn current(&self) -> Option<Arc<C::Connection>> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
