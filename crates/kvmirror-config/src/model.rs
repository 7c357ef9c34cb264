// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for kvmirror.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use kvmirror_core::StoreOptions;
use serde::{Deserialize, Serialize};

/// Top-level kvmirror configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Backing store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Flush scheduling settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// One-time import from a legacy flat store.
    #[serde(default)]
    pub legacy: LegacyConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
            legacy: LegacyConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Table holding the key/value rows.
    #[serde(default = "default_table")]
    pub table: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Milliseconds a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            table: default_table(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StorageConfig {
    /// Options handed to a [`KeyValueStorage`](kvmirror_core::KeyValueStorage) on init.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            database_path: self.database_path.clone().into(),
            table: self.table.clone(),
            wal_mode: self.wal_mode,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("kvmirror").join("kvmirror.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("kvmirror.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_table() -> String {
    "kvstorage".to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Debounce settings for the dirty-mirror flush.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Coalescing window between the first change signal and the flush.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    100
}

/// Legacy import settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyConfig {
    /// Copy entries out of the legacy source during initialization.
    #[serde(default)]
    pub copy_local_storage: bool,

    /// Only keys with this prefix are imported; the prefix is stripped.
    #[serde(default)]
    pub local_storage_prefix: String,

    /// JSON file holding the legacy entries.
    #[serde(default)]
    pub source_path: Option<String>,
}
