// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage adapters and the sync engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies which backing store sits behind a [`KeyValueStorage`](crate::KeyValueStorage).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// SQLite file accessed through a single background connection.
    Sqlite,
    /// Nothing is persisted; used when no backing store is available.
    Noop,
    /// In-process test double.
    Memory,
}

/// Lifecycle phase of the sync engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Constructed; the adapter has not been initialized.
    Uninitialized,
    /// Waiting for the adapter to open the store and load rows.
    Loading,
    /// Hydrated; mutations are flushed to the adapter.
    Ready,
}

/// The statement kind carried by a queued write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WriteKind {
    Upsert,
    Delete,
    Clear,
}

/// A write statement that failed after its caller had already returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub kind: WriteKind,
    /// Affected key; `None` for a clear.
    pub key: Option<String>,
    /// Rendered driver error.
    pub message: String,
}

impl std::fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} `{}` failed: {}", self.kind, key, self.message),
            None => write!(f, "{} failed: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for WriteFailure {}
