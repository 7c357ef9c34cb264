// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback store used when no backing database is available.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::warn;

use kvmirror_core::{
    BackendKind, HealthStatus, KeyValueStorage, MirrorError, PluginAdapter, StoreOptions,
};

/// Accepts every operation and persists nothing.
///
/// Values still round-trip within the process so callers behave the same
/// way they would against a real store until restart.
#[derive(Debug, Default)]
pub struct NoopStore {
    entries: Mutex<(HashMap<String, String>, Vec<String>)>,
    reason: Option<String>,
}

impl NoopStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fallback for a build or platform without a backing store.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::degraded(MirrorError::Unsupported(reason.into()))
    }

    /// Fallback standing in for a backend that failed with `cause`.
    /// Logs one warning.
    pub fn degraded(cause: MirrorError) -> Self {
        warn!(error = %cause, "key/value storage unsupported, nothing will be persisted");
        Self {
            entries: Mutex::default(),
            reason: Some(cause.to_string()),
        }
    }

    /// Why the real backend was unavailable, if known.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    fn with<R>(&self, f: impl FnOnce(&mut HashMap<String, String>, &mut Vec<String>) -> R) -> R {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let (values, keys) = &mut *guard;
        f(values, keys)
    }
}

#[async_trait]
impl PluginAdapter for NoopStore {
    fn name(&self) -> &str {
        "noop"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Noop
    }

    async fn health_check(&self) -> Result<HealthStatus, MirrorError> {
        Ok(HealthStatus::Degraded(
            self.reason
                .clone()
                .unwrap_or_else(|| "no backing store".to_string()),
        ))
    }

    async fn shutdown(&self) -> Result<(), MirrorError> {
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for NoopStore {
    async fn init(&self, _options: &StoreOptions) -> Result<(), MirrorError> {
        Ok(())
    }

    fn key(&self, index: usize) -> Option<String> {
        self.with(|_, keys| keys.get(index).cloned())
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.with(|values, _| values.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) {
        self.with(|values, keys| {
            if values.insert(key.to_string(), value.to_string()).is_none() {
                keys.push(key.to_string());
            }
        });
    }

    fn remove_item(&self, key: &str) {
        self.with(|values, keys| {
            if values.remove(key).is_some() {
                keys.retain(|k| k != key);
            }
        });
    }

    fn clear(&self) {
        self.with(|values, keys| {
            values.clear();
            keys.clear();
        });
    }

    fn len(&self) -> usize {
        self.with(|_, keys| keys.len())
    }

    fn supported(&self) -> bool {
        false
    }
}
