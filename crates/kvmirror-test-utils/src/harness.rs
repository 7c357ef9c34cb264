// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` opens a [`MirrorEngine`] over a SQLite file in a temporary
//! directory. [`TestHarness::reopen`] starts a fresh adapter and engine on
//! the same file, simulating a process restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kvmirror_core::{JsonCodec, MirrorError, StoreOptions};
use kvmirror_storage::SqliteKeyValueStore;
use kvmirror_sync::{InitOptions, MemorySource, Mirror, MirrorEngine};

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    table: String,
    debounce: Duration,
    defaults: Mirror,
    legacy: Option<(MemorySource, String)>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            table: "kvstorage".to_string(),
            debounce: Duration::from_millis(20),
            defaults: Mirror::new(),
            legacy: None,
        }
    }

    /// Set the table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the coalescing window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Defaults passed to init.
    pub fn with_defaults(mut self, defaults: Mirror) -> Self {
        self.defaults = defaults;
        self
    }

    /// Import `source` during init, filtered by `prefix`.
    pub fn with_legacy(mut self, source: MemorySource, prefix: impl Into<String>) -> Self {
        self.legacy = Some((source, prefix.into()));
        self
    }

    /// Create the temp directory and initialize the engine.
    pub async fn build(self) -> Result<TestHarness, MirrorError> {
        let temp_dir = tempfile::TempDir::new().map_err(MirrorError::connection)?;
        let db_path = temp_dir.path().join("test.db");

        let store = Arc::new(SqliteKeyValueStore::new());
        let engine = new_engine(store.clone(), self.debounce);

        let mut options = InitOptions::new(StoreOptions::new(&db_path, &self.table))
            .with_defaults(self.defaults);
        if let Some((source, prefix)) = self.legacy {
            options = options.with_legacy_source(source, prefix);
        }
        engine.init(options).await?;

        Ok(TestHarness {
            _temp_dir: temp_dir,
            db_path,
            table: self.table,
            debounce: self.debounce,
            store,
            engine,
        })
    }
}

/// An initialized engine over a throwaway SQLite database.
pub struct TestHarness {
    _temp_dir: tempfile::TempDir,
    db_path: PathBuf,
    table: String,
    debounce: Duration,
    store: Arc<SqliteKeyValueStore>,
    engine: MirrorEngine,
}

fn new_engine(store: Arc<SqliteKeyValueStore>, debounce: Duration) -> MirrorEngine {
    MirrorEngine::with_settings(store, Arc::new(JsonCodec), debounce)
}

impl TestHarness {
    /// Create a builder with a `kvstorage` table and a 20 ms window.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The engine under test.
    pub fn engine(&self) -> &MirrorEngine {
        &self.engine
    }

    /// The SQLite adapter behind the engine.
    pub fn store(&self) -> &Arc<SqliteKeyValueStore> {
        &self.store
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Fresh init options for this database and table.
    pub fn init_options(&self) -> InitOptions {
        InitOptions::new(StoreOptions::new(&self.db_path, &self.table))
    }

    /// Flush the engine and start a new adapter and engine on the same file.
    pub async fn reopen(&mut self) -> Result<&MirrorEngine, MirrorError> {
        self.engine.shutdown().await?;
        let store = Arc::new(SqliteKeyValueStore::new());
        let engine = new_engine(store.clone(), self.debounce);
        engine.init(self.init_options()).await?;
        self.store = store;
        self.engine = engine;
        Ok(&self.engine)
    }
}
