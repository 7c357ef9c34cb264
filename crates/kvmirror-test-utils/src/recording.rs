// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock key/value adapter that records every call.
//!
//! `RecordingStore` implements `KeyValueStorage` over an in-memory map and
//! keeps a log of the mutating calls it receives, so tests can assert the
//! exact statements an engine would have issued.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use kvmirror_core::{
    BackendKind, HealthStatus, KeyValueStorage, MirrorError, PluginAdapter, StoreOptions,
};

/// A call observed by [`RecordingStore`]. Reads are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    SetItem(String, String),
    RemoveItem(String),
    Clear,
    Flush,
}

#[derive(Debug, Default)]
struct State {
    values: HashMap<String, String>,
    keys: Vec<String>,
    calls: Vec<Call>,
}

/// In-memory adapter with a call log.
#[derive(Debug, Default)]
pub struct RecordingStore {
    state: Mutex<State>,
    fail_init: bool,
}

impl RecordingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with rows, in order. Loading is not recorded.
    pub fn with_rows<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut state = store.lock();
            for (k, v) in rows {
                let k = k.into();
                if state.values.insert(k.clone(), v.into()).is_none() {
                    state.keys.push(k);
                }
            }
        }
        store
    }

    /// Create a store whose `init` fails with a connection error.
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Current rows, in key-index order.
    pub fn rows(&self) -> Vec<(String, String)> {
        let state = self.lock();
        state
            .keys
            .iter()
            .map(|k| (k.clone(), state.values[k].clone()))
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn health_check(&self) -> Result<HealthStatus, MirrorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MirrorError> {
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for RecordingStore {
    async fn init(&self, _options: &StoreOptions) -> Result<(), MirrorError> {
        self.lock().calls.push(Call::Init);
        if self.fail_init {
            return Err(MirrorError::connection(std::io::Error::other(
                "unable to open database file",
            )));
        }
        Ok(())
    }

    fn key(&self, index: usize) -> Option<String> {
        self.lock().keys.get(index).cloned()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut state = self.lock();
        if state
            .values
            .insert(key.to_string(), value.to_string())
            .is_none()
        {
            state.keys.push(key.to_string());
        }
        state
            .calls
            .push(Call::SetItem(key.to_string(), value.to_string()));
    }

    fn remove_item(&self, key: &str) {
        let mut state = self.lock();
        if state.values.remove(key).is_some() {
            state.keys.retain(|k| k != key);
        }
        state.calls.push(Call::RemoveItem(key.to_string()));
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.values.clear();
        state.keys.clear();
        state.calls.push(Call::Clear);
    }

    fn len(&self) -> usize {
        self.lock().keys.len()
    }

    async fn flush(&self) -> Result<(), MirrorError> {
        self.lock().calls.push(Call::Flush);
        Ok(())
    }
}
