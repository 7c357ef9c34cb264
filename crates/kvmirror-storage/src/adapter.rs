// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`KeyValueStorage`] contract.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{OnceCell, broadcast};
use tracing::{debug, info};

use kvmirror_config::validation::is_sql_identifier;
use kvmirror_core::{
    BackendKind, HealthStatus, KeyValueStorage, MirrorError, PluginAdapter, StoreOptions,
    WriteFailure,
};

use crate::database::Database;
use crate::queries::kv;
use crate::writer::{WriteOp, WriteQueue};

/// In-process copy of the table: values plus the key index.
///
/// `keys` holds every key of `values` exactly once, in insertion order.
#[derive(Debug, Default)]
struct Cache {
    values: HashMap<String, String>,
    keys: Vec<String>,
}

impl Cache {
    fn insert(&mut self, key: &str, value: &str) {
        if self
            .values
            .insert(key.to_string(), value.to_string())
            .is_none()
        {
            self.keys.push(key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.values.remove(key).is_none() {
            return false;
        }
        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(pos);
        }
        true
    }

    fn clear(&mut self) {
        self.values.clear();
        self.keys.clear();
    }

    fn load(&mut self, rows: Vec<(String, String)>) {
        self.clear();
        for (key, value) in rows {
            self.insert(&key, &value);
        }
    }
}

/// Open database handle plus the writer bound to its table.
#[derive(Debug)]
struct Connected {
    db: Database,
    table: String,
    writer: WriteQueue,
}

/// SQLite-backed key/value store.
///
/// Reads are answered from the cache. Writes update the cache and then
/// enqueue the matching statement on a [`WriteQueue`]. The database is
/// opened on the first call to [`KeyValueStorage::init`].
#[derive(Debug, Default)]
pub struct SqliteKeyValueStore {
    conn: OnceCell<Connected>,
    cache: Mutex<Cache>,
}

impl SqliteKeyValueStore {
    /// Create a store; nothing is opened until [`KeyValueStorage::init`].
    pub fn new() -> Self {
        Self::default()
    }

    fn cache(&self) -> MutexGuard<'_, Cache> {
        // Cache updates never panic midway, so a poisoned guard is still consistent.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connected(&self) -> Result<&Connected, MirrorError> {
        self.conn.get().ok_or_else(|| {
            MirrorError::Internal("storage not initialized -- call init() first".into())
        })
    }

    fn enqueue(&self, op: WriteOp) {
        match self.conn.get() {
            Some(c) => c.writer.enqueue(op),
            // Cache already updated; the row catches up on the next write or reload.
            None => debug!(?op, "storage not initialized, write dropped"),
        }
    }

    /// Subscribe to asynchronous write failures.
    pub fn subscribe_failures(&self) -> Result<broadcast::Receiver<WriteFailure>, MirrorError> {
        Ok(self.connected()?.writer.subscribe())
    }

    /// Snapshot of the key index, in index order.
    pub fn keys(&self) -> Vec<String> {
        self.cache().keys.clone()
    }

    /// The table this store was initialized against.
    pub fn table(&self) -> Option<&str> {
        self.conn.get().map(|c| c.table.as_str())
    }

    async fn connect(options: &StoreOptions) -> Result<Connected, MirrorError> {
        if !is_sql_identifier(&options.table) {
            return Err(MirrorError::Config(format!(
                "table name `{}` is not a valid SQL identifier",
                options.table
            )));
        }
        let db = Database::open(options).await?;
        kv::create_table(&db, &options.table).await?;
        let writer = WriteQueue::spawn(db.clone(), options.table.clone());
        Ok(Connected {
            db,
            table: options.table.clone(),
            writer,
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteKeyValueStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn health_check(&self) -> Result<HealthStatus, MirrorError> {
        self.connected()?.db.ping().await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MirrorError> {
        if let Some(c) = self.conn.get() {
            let drained = c.writer.flush().await;
            c.db.checkpoint().await?;
            drained?;
            debug!(table = %c.table, "shutdown: writes drained");
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for SqliteKeyValueStore {
    async fn init(&self, options: &StoreOptions) -> Result<(), MirrorError> {
        let connected = self
            .conn
            .get_or_try_init(|| Self::connect(options))
            .await?;
        if connected.table != options.table {
            return Err(MirrorError::Config(format!(
                "store already bound to table `{}`, cannot switch to `{}`",
                connected.table, options.table
            )));
        }

        // Queued writes must land before the reload reads the table.
        connected.writer.settle().await?;
        let rows = kv::select_all(&connected.db, &connected.table).await?;
        let count = rows.len();
        self.cache().load(rows);
        info!(
            path = %connected.db.label(),
            table = %connected.table,
            rows = count,
            "key/value store loaded"
        );
        Ok(())
    }

    fn key(&self, index: usize) -> Option<String> {
        self.cache().keys.get(index).cloned()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.cache().values.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.cache().insert(key, value);
        self.enqueue(WriteOp::Upsert {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn remove_item(&self, key: &str) {
        if self.cache().remove(key) {
            self.enqueue(WriteOp::Delete {
                key: key.to_string(),
            });
        }
    }

    fn clear(&self) {
        let mut cache = self.cache();
        if cache.keys.is_empty() {
            return;
        }
        cache.clear();
        drop(cache);
        self.enqueue(WriteOp::Clear);
    }

    fn len(&self) -> usize {
        self.cache().keys.len()
    }

    async fn flush(&self) -> Result<(), MirrorError> {
        match self.conn.get() {
            Some(c) => c.writer.flush().await,
            None => Ok(()),
        }
    }
}
