//! Aerospike-backed store client.
//!
//! The Aerospike client is blocking, so every call runs on the tokio blocking
//! pool. The connection gate owns the client; each operation borrows the live
//! handle from the gate before touching the network.

use std::sync::Arc;
use std::time::Duration;

use ::aerospike::{
    operations, Bin, Bins as AsBins, Client, ClientPolicy, FloatValue, Key, Priority,
    QueryPolicy, ReadPolicy, Recordset, ScanPolicy, Statement, Value, WritePolicy,
};
use async_trait::async_trait;
use tracing::{debug, warn};
use visitboard_core::{BoardResult, ConnectionError, MessageId, StoreConfig, StoreError};

use super::{BinValue, Bins, IdentifierCounter, Record, StoreClient, BIN_COUNT};
use crate::gate::{ConnectionGate, Connector, StoreConnection};

/// Opens Aerospike clients against a fixed seed host list.
#[derive(Debug, Clone)]
pub struct AerospikeConnector {
    hosts: String,
}

impl AerospikeConnector {
    pub fn new(hosts: impl Into<String>) -> Self {
        Self {
            hosts: hosts.into(),
        }
    }
}

#[async_trait]
impl Connector for AerospikeConnector {
    type Connection = AerospikeConnection;

    async fn connect(&self) -> BoardResult<AerospikeConnection> {
        let hosts = self.hosts.clone();
        debug!(%hosts, "connecting to aerospike");

        let client = run_blocking(move || {
            Client::new(&ClientPolicy::default(), &hosts).map_err(|e| e.to_string())
        })
        .await
        .map_err(|reason| ConnectionError::ConnectFailed { reason })?;

        Ok(AerospikeConnection {
            client: Arc::new(client),
        })
    }
}

/// A live Aerospike client.
pub struct AerospikeConnection {
    client: Arc<Client>,
}

impl AerospikeConnection {
    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }
}

impl StoreConnection for AerospikeConnection {
    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn close(&self) {
        if let Err(err) = self.client.close() {
            warn!(error = %err, "closing aerospike client failed");
        }
    }
}

/// Message set and counter record stored in Aerospike.
pub struct AerospikeStore {
    gate: Arc<ConnectionGate<AerospikeConnector>>,
    namespace: String,
    set_name: String,
    counter_set: String,
    counter_key: String,
}

impl AerospikeStore {
    /// Create the store and start connecting in the background.
    pub fn connect(config: &StoreConfig) -> BoardResult<Self> {
        config.validate()?;
        Ok(Self {
            gate: ConnectionGate::start(AerospikeConnector::new(config.hosts.clone())),
            namespace: config.namespace.clone(),
            set_name: config.set_name.clone(),
            counter_set: config.counter_set.clone(),
            counter_key: config.counter_key.clone(),
        })
    }

    pub fn gate(&self) -> &ConnectionGate<AerospikeConnector> {
        &self.gate
    }

    fn message_key(&self, id: MessageId) -> BoardResult<Key> {
        Key::new(
            self.namespace.clone(),
            self.set_name.clone(),
            Value::from(id.to_string()),
        )
        .map_err(|e| {
            StoreError::InvalidKey {
                key: id.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn counter_record_key(&self) -> BoardResult<Key> {
        Key::new(
            self.namespace.clone(),
            self.counter_set.clone(),
            Value::from(self.counter_key.clone()),
        )
        .map_err(|e| {
            StoreError::InvalidKey {
                key: self.counter_key.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn client(&self) -> BoardResult<Arc<Client>> {
        Ok(self.gate.check_connection().await?.client())
    }
}

#[async_trait]
impl StoreClient for AerospikeStore {
    async fn put(&self, key: MessageId, bins: Bins) -> BoardResult<()> {
        let client = self.client().await?;
        let as_key = self.message_key(key)?;

        run_blocking(move || {
            let bins: Vec<Bin> = bins
                .iter()
                .map(|(name, value)| Bin::new(name.as_str(), to_value(value)))
                .collect();
            client
                .put(&WritePolicy::default(), &as_key, &bins)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|reason| StoreError::PutFailed { key, reason })?;
        Ok(())
    }

    async fn delete(&self, key: MessageId) -> BoardResult<bool> {
        let client = self.client().await?;
        let as_key = self.message_key(key)?;

        let existed = run_blocking(move || {
            let policy = WritePolicy::default();
            if !client.exists(&policy, &as_key).map_err(|e| e.to_string())? {
                return Ok(false);
            }
            client.delete(&policy, &as_key).map_err(|e| e.to_string())
        })
        .await
        .map_err(|reason| StoreError::DeleteFailed { key, reason })?;
        Ok(existed)
    }

    async fn query_by_range(&self, index: &str, from: i64, to: i64) -> BoardResult<Vec<Record>> {
        let client = self.client().await?;
        let mut statement = Statement::new(&self.namespace, &self.set_name, AsBins::All);
        statement.add_filter(::aerospike::as_range!(index, from, to));

        let records = run_blocking(move || {
            let recordset = client
                .query(&QueryPolicy::default(), statement)
                .map_err(|e| e.to_string())?;
            collect_records(&recordset)
        })
        .await
        .map_err(|reason| StoreError::RangeQueryFailed {
            index: index.to_string(),
            from,
            to,
            reason,
        })?;
        Ok(records)
    }

    async fn scan_all(&self) -> BoardResult<Vec<Record>> {
        let client = self.client().await?;
        let namespace = self.namespace.clone();
        let set_name = self.set_name.clone();

        let records = run_blocking(move || {
            let recordset = client
                .scan(&background_scan_policy(), &namespace, &set_name, AsBins::All)
                .map_err(|e| e.to_string())?;
            collect_records(&recordset)
        })
        .await
        .map_err(|reason| StoreError::ScanFailed { reason })?;
        Ok(records)
    }

    async fn count_all(&self) -> BoardResult<usize> {
        let client = self.client().await?;
        let namespace = self.namespace.clone();
        let set_name = self.set_name.clone();

        let count = run_blocking(move || {
            let recordset = client
                .scan(&background_scan_policy(), &namespace, &set_name, AsBins::None)
                .map_err(|e| e.to_string())?;
            let mut count = 0;
            for result in &*recordset {
                result.map_err(|e| e.to_string())?;
                count += 1;
            }
            Ok(count)
        })
        .await
        .map_err(|reason| StoreError::CountFailed { reason })?;
        Ok(count)
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
impl IdentifierCounter for AerospikeStore {
    async fn get_counter(&self) -> BoardResult<i64> {
        let client = self.client().await?;
        let key = self.counter_record_key()?;

        let value = run_blocking(move || {
            let record = client
                .get(
                    &ReadPolicy::default(),
                    &key,
                    AsBins::Some(vec![BIN_COUNT.to_string()]),
                )
                .map_err(|e| e.to_string())?;
            match record.bins.get(BIN_COUNT) {
                Some(Value::Int(v)) => Ok(*v),
                Some(other) => Err(format!("counter bin holds {other}")),
                None => Err("counter bin missing".to_string()),
            }
        })
        .await
        .map_err(|reason| StoreError::CounterUnavailable { reason })?;
        Ok(value)
    }

    async fn increment(&self, by: i64) -> BoardResult<i64> {
        let client = self.client().await?;
        let key = self.counter_record_key()?;

        let value = run_blocking(move || {
            let bin = Bin::new(BIN_COUNT, Value::Int(by));
            let ops = [operations::add(&bin), operations::get_bin(BIN_COUNT)];
            let record = client
                .operate(&WritePolicy::default(), &key, &ops)
                .map_err(|e| e.to_string())?;
            match record.bins.get(BIN_COUNT) {
                Some(Value::Int(v)) => Ok(*v),
                _ => Err("counter bin missing from operate result".to_string()),
            }
        })
        .await
        .map_err(|reason| StoreError::CounterFailed { by, reason })?;
        Ok(value)
    }
}

/// Low priority, all nodes in parallel.
fn background_scan_policy() -> ScanPolicy {
    let mut policy = ScanPolicy::default();
    policy.base_policy.priority = Priority::Low;
    policy.max_concurrent_nodes = 0;
    policy
}

fn collect_records(recordset: &Recordset) -> Result<Vec<Record>, String> {
    let mut records = Vec::new();
    for result in recordset {
        let record = result.map_err(|e| e.to_string())?;
        records.push(Record::new(
            record
                .bins
                .iter()
                .map(|(name, value)| (name.clone(), from_value(value)))
                .collect(),
        ));
    }
    Ok(records)
}

fn to_value(value: &BinValue) -> Value {
    match value {
        BinValue::Int(v) => Value::Int(*v),
        BinValue::Float(v) => Value::from(*v),
        BinValue::Str(v) => Value::String(v.clone()),
        BinValue::Blob(v) => Value::Blob(v.clone()),
        BinValue::Nil => Value::Nil,
    }
}

fn from_value(value: &Value) -> BinValue {
    match value {
        Value::Int(v) => BinValue::Int(*v),
        Value::UInt(v) => i64::try_from(*v).map(BinValue::Int).unwrap_or(BinValue::Nil),
        Value::Float(FloatValue::F64(bits)) => BinValue::Float(f64::from_bits(*bits)),
        Value::Float(FloatValue::F32(bits)) => BinValue::Float(f32::from_bits(*bits).into()),
        Value::String(v) => BinValue::Str(v.clone()),
        Value::Blob(v) => BinValue::Blob(v.clone()),
        _ => BinValue::Nil,
    }
}

/// Run a blocking client call off the async worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("blocking task failed: {e}"))?
}
