// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! Every statement runs on tokio-rusqlite's single background thread, so a
//! [`Database`] turns the driver's blocking calls into one awaitable outcome
//! each: a value or a [`MirrorError`]. Nothing here retries or reorders.

use std::time::Duration;

use kvmirror_core::{MirrorError, StoreOptions};
use tokio_rusqlite::Connection;
use tracing::debug;

/// Map a tokio-rusqlite error: a closed connection is a connection failure,
/// anything else is a failed statement.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MirrorError {
    match e {
        tokio_rusqlite::Error::ConnectionClosed => MirrorError::connection(e),
        other => MirrorError::query(other),
    }
}

/// Handle to one SQLite database.
///
/// Cloning is cheap and every clone shares the same background thread.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
    label: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("label", &self.label).finish()
    }
}

impl Database {
    /// Open (creating if needed) the database file named in `options`.
    ///
    /// Missing parent directories are created. Fails with
    /// [`MirrorError::Connection`] when the file cannot be opened or configured.
    pub async fn open(options: &StoreOptions) -> Result<Self, MirrorError> {
        let path = options.database_path.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(MirrorError::connection)?;
        }

        let conn = Connection::open(&path)
            .await
            .map_err(MirrorError::connection)?;
        let db = Self {
            conn,
            label: path.display().to_string(),
        };
        db.configure(options.wal_mode, options.busy_timeout).await?;
        debug!(path = %db.label, wal = options.wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, MirrorError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(MirrorError::connection)?;
        let db = Self {
            conn,
            label: ":memory:".to_string(),
        };
        db.configure(false, Duration::from_millis(5000)).await?;
        Ok(db)
    }

    async fn configure(&self, wal_mode: bool, busy_timeout: Duration) -> Result<(), MirrorError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.busy_timeout(busy_timeout)?;
                if wal_mode {
                    // journal_mode answers with the resulting mode, so it must be queried.
                    let _mode: String =
                        conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
                }
                conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
                Ok(())
            })
            .await
            .map_err(|e| match map_tr_err(e) {
                MirrorError::Query { source } => MirrorError::Connection { source },
                other => other,
            })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Path (or `:memory:`) this handle was opened with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run one statement with string parameters; returns the affected row count.
    pub async fn execute(&self, sql: String, params: Vec<String>) -> Result<usize, MirrorError> {
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(&sql, rusqlite::params_from_iter(params.iter()))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Run a query whose rows are two text columns, in the order SQLite returns them.
    pub async fn query_pairs(&self, sql: String) -> Result<Vec<(String, String)>, MirrorError> {
        self.conn
            .call(move |conn| -> Result<Vec<(String, String)>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<(), MirrorError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), MirrorError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.label, "WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the connection.
    ///
    /// Other clones of this handle fail with a connection error afterwards.
    pub async fn close(self) -> Result<(), MirrorError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(MirrorError::connection)
    }
}
