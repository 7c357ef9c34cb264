// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The synchronous key-value storage contract.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::MirrorError;
use crate::traits::adapter::PluginAdapter;

/// Where and how a backend opens its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Database file location.
    pub database_path: PathBuf,
    /// Name of the two-column table holding the rows.
    pub table: String,
    /// Enable write-ahead logging.
    pub wal_mode: bool,
    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,
}

impl StoreOptions {
    /// Options for `table` inside the database at `database_path`, with WAL
    /// enabled and a five second busy timeout.
    pub fn new(database_path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            table: table.into(),
            wal_mode: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// A flat string-to-string store with a classic synchronous interface.
///
/// Only [`init`](KeyValueStorage::init) and [`flush`](KeyValueStorage::flush)
/// are async. Every other call answers from an in-process cache; mutations
/// update the cache first and hand the matching statement to the backend
/// without waiting for it.
#[async_trait]
pub trait KeyValueStorage: PluginAdapter {
    /// Open the backing store if needed and load every row into the cache.
    ///
    /// Calling it again reloads from the same table. Backends that bind to
    /// the first table they open reject a different one with
    /// [`MirrorError::Config`].
    async fn init(&self, options: &StoreOptions) -> Result<(), MirrorError>;

    /// Key at position `index` of the key index, or `None` past the end.
    fn key(&self, index: usize) -> Option<String>;

    /// Cached value for `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Insert or replace `key`.
    fn set_item(&self, key: &str, value: &str);

    /// Remove `key`. No-op if absent.
    fn remove_item(&self, key: &str);

    /// Remove every entry.
    fn clear(&self);

    /// Number of cached entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether anything written here is persisted.
    fn supported(&self) -> bool {
        true
    }

    /// Wait for every write issued so far to reach the backend.
    ///
    /// Returns the first write failure seen since the previous flush.
    async fn flush(&self) -> Result<(), MirrorError> {
        Ok(())
    }
}
