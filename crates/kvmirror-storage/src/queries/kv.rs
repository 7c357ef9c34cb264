// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key/value table statements.
//!
//! The table has two text columns, `storagekey` (primary key) and
//! `storagevalue`. Table names are validated as SQL identifiers before they
//! reach these functions and are additionally quoted.

use kvmirror_core::MirrorError;

use crate::database::Database;

fn quoted(table: &str) -> String {
    format!("\"{table}\"")
}

/// Create the table if it does not exist yet.
pub async fn create_table(db: &Database, table: &str) -> Result<(), MirrorError> {
    db.execute(
        format!(
            "CREATE TABLE IF NOT EXISTS {} (storagekey TEXT PRIMARY KEY, storagevalue TEXT)",
            quoted(table)
        ),
        vec![],
    )
    .await
    .map(|_| ())
}

/// Every row, in whatever order SQLite yields them.
pub async fn select_all(db: &Database, table: &str) -> Result<Vec<(String, String)>, MirrorError> {
    db.query_pairs(format!(
        "SELECT storagekey, storagevalue FROM {}",
        quoted(table)
    ))
    .await
}

/// Insert or replace one row.
pub async fn upsert(db: &Database, table: &str, key: &str, value: &str) -> Result<(), MirrorError> {
    db.execute(
        format!("INSERT OR REPLACE INTO {} VALUES (?1, ?2)", quoted(table)),
        vec![key.to_string(), value.to_string()],
    )
    .await
    .map(|_| ())
}

/// Delete one row by exact key.
pub async fn delete(db: &Database, table: &str, key: &str) -> Result<(), MirrorError> {
    db.execute(
        format!("DELETE FROM {} WHERE storagekey = ?1", quoted(table)),
        vec![key.to_string()],
    )
    .await
    .map(|_| ())
}

/// Delete every row.
pub async fn delete_all(db: &Database, table: &str) -> Result<(), MirrorError> {
    db.execute(format!("DELETE FROM {}", quoted(table)), vec![])
        .await
        .map(|_| ())
}
