// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backends for kvmirror.
//!
//! With the default `sqlite` feature this crate provides a WAL-mode SQLite
//! store driven through `tokio-rusqlite`, with a single ordered write queue.
//! Without it only [`NoopStore`] is available.

#[cfg(feature = "sqlite")]
pub mod adapter;
#[cfg(feature = "sqlite")]
pub mod database;
pub mod noop;
#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod writer;

#[cfg(feature = "sqlite")]
pub use adapter::SqliteKeyValueStore;
#[cfg(feature = "sqlite")]
pub use database::Database;
pub use noop::NoopStore;
#[cfg(feature = "sqlite")]
pub use writer::{WriteOp, WriteQueue};

use std::sync::Arc;

use kvmirror_core::KeyValueStorage;

/// The best store this build can provide.
///
/// SQLite when compiled in, otherwise a [`NoopStore`] that warns once.
pub fn default_store() -> Arc<dyn KeyValueStorage> {
    #[cfg(feature = "sqlite")]
    {
        Arc::new(SqliteKeyValueStore::new())
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Arc::new(NoopStore::unsupported(
            "built without the `sqlite` feature",
        ))
    }
}
