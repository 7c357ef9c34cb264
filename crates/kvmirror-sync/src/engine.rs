// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dirty-mirror sync engine.
//!
//! [`MirrorEngine`] owns a live [`Mirror`] and the snapshot of what was last
//! flushed. Callers mutate the mirror freely; each mutation (or an explicit
//! [`tick`](MirrorEngine::tick)) arms a debounced flush that diffs the
//! mirror against the snapshot and pushes the difference through a
//! [`KeyValueStorage`] adapter.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use kvmirror_core::{Codec, JsonCodec, KeyValueStorage, MirrorError, Phase, is_data_key};

use crate::bootstrap::{self, InitOptions, MigrationReport};
use crate::mirror::{self, Mirror};
use crate::scheduler::{DEFAULT_DEBOUNCE, FlushScheduler};

/// Statements issued by one [`MirrorEngine::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// `set_item` calls.
    pub written: usize,
    /// `remove_item` calls.
    pub removed: usize,
    /// Values left unwritten because they do not survive the codec.
    pub rejected: usize,
}

impl FlushStats {
    pub fn is_empty(&self) -> bool {
        self.written == 0 && self.removed == 0 && self.rejected == 0
    }
}

#[derive(Debug)]
struct EngineState {
    phase: Phase,
    mirror: Mirror,
    snapshot: Mirror,
    last_migration: Option<MigrationReport>,
}

struct Inner {
    store: Arc<dyn KeyValueStorage>,
    codec: Arc<dyn Codec>,
    scheduler: FlushScheduler,
    state: Mutex<EngineState>,
    phase_tx: watch::Sender<Phase>,
}

/// Handle to a mirror kept in sync with a key/value store.
///
/// Cloning is cheap; clones share the same mirror.
#[derive(Clone)]
pub struct MirrorEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MirrorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorEngine")
            .field("store", &self.inner.store.name())
            .field("phase", &self.phase())
            .finish()
    }
}

impl MirrorEngine {
    /// Engine over `store` with the JSON codec and the default debounce window.
    pub fn new(store: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_settings(store, Arc::new(JsonCodec), DEFAULT_DEBOUNCE)
    }

    pub fn with_settings(
        store: Arc<dyn KeyValueStorage>,
        codec: Arc<dyn Codec>,
        debounce: Duration,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Uninitialized);
        let engine = Self {
            inner: Arc::new(Inner {
                store,
                codec,
                scheduler: FlushScheduler::new(debounce),
                state: Mutex::new(EngineState {
                    phase: Phase::Uninitialized,
                    mirror: Mirror::new(),
                    snapshot: Mirror::new(),
                    last_migration: None,
                }),
                phase_tx,
            }),
        };
        // Whatever the adapter already holds, before init.
        engine.sync();
        {
            let mut state = engine.state();
            state.snapshot = state.mirror.clone();
        }
        engine
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // No code path panics while holding the lock with a half-updated state.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut EngineState, phase: Phase) {
        state.phase = phase;
        self.inner.phase_tx.send_replace(phase);
    }

    /// Open the store, hydrate the mirror, apply defaults, and run the
    /// legacy import if requested.
    ///
    /// Returns the hydrated mirror. Fails if the adapter cannot open the
    /// store; the engine then returns to [`Phase::Uninitialized`].
    pub async fn init(&self, mut options: InitOptions) -> Result<Mirror, MirrorError> {
        options.check()?;
        {
            let mut state = self.state();
            self.set_phase(&mut state, Phase::Loading);
        }
        debug!(table = %options.store.table, "initializing mirror");

        if let Err(e) = self.inner.store.init(&options.store).await {
            let mut state = self.state();
            self.set_phase(&mut state, Phase::Uninitialized);
            return Err(e);
        }

        let loaded = self.load_from_store();
        let loaded_count = loaded.len();
        let report = {
            let mut state = self.state();
            for (key, value) in &loaded {
                state.mirror.insert(key.clone(), value.clone());
            }
            // The snapshot is what the store holds right now.
            state.snapshot = loaded.into_iter().collect();
            state.phase = Phase::Ready;

            bootstrap::apply_defaults(&mut state.mirror, std::mem::take(&mut options.defaults));

            let report = match options.take_legacy_source() {
                Some(mut source) if options.copy_local_storage => Some(bootstrap::migrate(
                    &mut state.mirror,
                    source.as_mut(),
                    &options.local_storage_prefix,
                    self.inner.codec.as_ref(),
                )),
                _ => None,
            };
            state.last_migration = report.clone();
            report
        };

        self.inner.phase_tx.send_replace(Phase::Ready);
        info!(
            backend = %self.inner.store.backend_kind(),
            loaded = loaded_count,
            migrated = report.as_ref().map_or(0, |r| r.copied.len()),
            "mirror ready"
        );
        self.schedule_flush();
        Ok(self.mirror())
    }

    /// Decoded data entries of the adapter, in its key-index order.
    fn load_from_store(&self) -> Vec<(String, Value)> {
        let store = &self.inner.store;
        let mut loaded = Vec::with_capacity(store.len());
        for i in 0..store.len() {
            let Some(key) = store.key(i) else { continue };
            if !is_data_key(&key) {
                debug!(key = %key, "reserved key in store, not hydrated");
                continue;
            }
            let Some(raw) = store.get_item(&key) else {
                continue;
            };
            match self.inner.codec.decode(&raw) {
                Ok(value) => loaded.push((key, value)),
                Err(e) => warn!(key = %key, error = %e, "stored value does not decode, skipped"),
            }
        }
        loaded
    }

    /// Overwrite mirror entries with the adapter's current values.
    ///
    /// Keys present only in the mirror are left alone. Returns the number
    /// of entries loaded.
    pub fn sync(&self) -> usize {
        let loaded = self.load_from_store();
        let count = loaded.len();
        let mut state = self.state();
        for (key, value) in loaded {
            state.snapshot.insert(key.clone(), value.clone());
            state.mirror.insert(key, value);
        }
        count
    }

    /// Set every key of `items` that the mirror does not have yet.
    pub fn default<I, K>(&self, items: I) -> Mirror
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (changed, mirror) = {
            let mut state = self.state();
            let changed = bootstrap::apply_defaults(&mut state.mirror, items);
            (changed, state.mirror.clone())
        };
        if changed {
            self.schedule_flush();
        }
        mirror
    }

    /// Drop every data key, clear the store, then apply `items` as defaults.
    pub fn reset<I, K>(&self, items: I) -> Mirror
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        {
            let mut state = self.state();
            mirror::clear_data(&mut state.mirror);
            mirror::clear_data(&mut state.snapshot);
            self.inner.store.clear();
        }
        debug!("mirror reset");
        self.schedule_flush();
        self.default(items)
    }

    /// Push the difference between mirror and snapshot to the store.
    ///
    /// Disarms any pending flush first. Does nothing before the engine is
    /// ready or when the data keys of mirror and snapshot are equal.
    /// Otherwise every data key of the mirror is written and every data key
    /// that only the snapshot has is removed; the snapshot then becomes a
    /// copy of the mirror.
    pub fn apply(&self) -> FlushStats {
        self.inner.scheduler.cancel();

        let mut state = self.state();
        if state.phase != Phase::Ready || mirror::data_eq(&state.mirror, &state.snapshot) {
            return FlushStats::default();
        }

        let store = &self.inner.store;
        let mut stats = FlushStats::default();
        let mut stale = state.snapshot.clone();
        for (key, value) in mirror::data_entries(&state.mirror) {
            stale.shift_remove(key);
            match self.inner.codec.encode_checked(value) {
                Ok(encoded) => {
                    store.set_item(key, &encoded);
                    stats.written += 1;
                }
                Err(e) => {
                    error!(key = %key, error = %e, "value not persisted, keeping the stored one");
                    stats.rejected += 1;
                }
            }
        }
        for key in stale.keys().filter(|k| is_data_key(k)) {
            store.remove_item(key);
            stats.removed += 1;
        }

        state.snapshot = state.mirror.clone();
        drop(state);

        debug!(
            written = stats.written,
            removed = stats.removed,
            rejected = stats.rejected,
            "mirror flushed"
        );
        stats
    }

    fn schedule_flush(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.request(move || {
            if let Some(inner) = weak.upgrade() {
                MirrorEngine { inner }.apply();
            }
        });
    }

    /// Change signal from the host; arms a debounced flush.
    pub fn tick(&self) {
        self.schedule_flush();
    }

    /// Whether a debounced flush is armed.
    pub fn flush_pending(&self) -> bool {
        self.inner.scheduler.is_pending()
    }

    /// Flush now and wait until the store has executed every statement.
    pub async fn persist(&self) -> Result<FlushStats, MirrorError> {
        let stats = self.apply();
        self.inner.store.flush().await?;
        Ok(stats)
    }

    /// Teardown flush: disarm the timer, flush, and drain the store.
    pub async fn shutdown(&self) -> Result<(), MirrorError> {
        if self.inner.scheduler.cancel() {
            debug!("pending flush replaced by teardown flush");
        }
        self.apply();
        self.inner.store.flush().await
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state().mirror.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state().mirror.contains_key(key)
    }

    /// Insert or replace `key`; returns the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let previous = self.state().mirror.insert(key.into(), value.into());
        self.schedule_flush();
        previous
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let previous = self.state().mirror.shift_remove(key);
        if previous.is_some() {
            self.schedule_flush();
        }
        previous
    }

    /// Mutate the mirror in place and arm a flush.
    pub fn update<R>(&self, f: impl FnOnce(&mut Mirror) -> R) -> R {
        let result = f(&mut self.state().mirror);
        self.schedule_flush();
        result
    }

    /// Data keys, in mirror order.
    pub fn keys(&self) -> Vec<String> {
        mirror::data_entries(&self.state().mirror)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Copy of the whole mirror.
    pub fn mirror(&self) -> Mirror {
        self.state().mirror.clone()
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    /// Whether the adapter persists anything.
    pub fn supported(&self) -> bool {
        self.inner.store.supported()
    }

    /// Observe phase changes. The value becomes [`Phase::Ready`] once init
    /// has completed.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.inner.phase_tx.subscribe()
    }

    /// Report of the legacy import run by the last `init`.
    pub fn last_migration(&self) -> Option<MigrationReport> {
        self.state().last_migration.clone()
    }

    /// The adapter behind this engine.
    pub fn store(&self) -> &Arc<dyn KeyValueStorage> {
        &self.inner.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::MemorySource;
    use crate::mirror::mirror_from;
    use kvmirror_core::StoreOptions;
    use kvmirror_test_utils::{Call, RecordingStore};
    use serde_json::json;

    fn options() -> InitOptions {
        InitOptions::new(StoreOptions::new("/tmp/unused.db", "kv"))
    }

    async fn ready_engine(store: Arc<RecordingStore>) -> MirrorEngine {
        let engine = MirrorEngine::with_settings(
            store.clone(),
            Arc::new(JsonCodec),
            Duration::from_millis(100),
        );
        engine.init(options()).await.unwrap();
        engine.apply();
        store.take_calls();
        engine
    }

    #[tokio::test(start_paused = true)]
    async fn apply_with_no_changes_issues_no_calls() {
        let store = Arc::new(RecordingStore::with_rows([("x", "1")]));
        let engine = ready_engine(store.clone()).await;

        assert!(engine.apply().is_empty());
        assert!(store.take_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn apply_writes_floats_exactly() {
        let store = Arc::new(RecordingStore::new());
        let engine = ready_engine(store.clone()).await;

        engine.set("price", 0.24285714285714285);
        let stats = engine.apply();
        assert_eq!(stats.written, 1);
        assert_eq!(stats.rejected, 0);
        assert_eq!(
            store.take_calls(),
            vec![Call::SetItem("price".into(), "0.24285714285714285".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn apply_writes_mirror_and_removes_dropped_keys() {
        let store = Arc::new(RecordingStore::with_rows([("b", "2")]));
        let engine = ready_engine(store.clone()).await;

        engine.set("a", 1);
        engine.remove("b");
        let stats = engine.apply();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(
            store.take_calls(),
            vec![
                Call::SetItem("a".into(), "1".into()),
                Call::RemoveItem("b".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reserved_keys_are_never_written() {
        let store = Arc::new(RecordingStore::new());
        let engine = ready_engine(store.clone()).await;

        engine.set("$hidden", 1);
        engine.set("_private", 2);
        engine.set("length", 3);
        assert!(engine.apply().is_empty());
        assert!(store.take_calls().is_empty());
        assert!(engine.keys().is_empty());
        assert_eq!(engine.get("$hidden"), Some(json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_flushed_before_ready() {
        let store = Arc::new(RecordingStore::new());
        let engine = MirrorEngine::new(store.clone());
        assert_eq!(engine.phase(), Phase::Uninitialized);

        engine.set("early", "value");
        assert!(engine.apply().is_empty());
        assert!(store.take_calls().is_empty());

        engine.init(options()).await.unwrap();
        assert_eq!(engine.phase(), Phase::Ready);
        engine.apply();
        assert_eq!(
            store.take_calls(),
            vec![Call::Init, Call::SetItem("early".into(), "\"value\"".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn defaults_do_not_override_loaded_values() {
        let store = Arc::new(RecordingStore::with_rows([("x", "5")]));
        let engine = MirrorEngine::new(store.clone());
        engine
            .init(options().with_defaults(mirror_from([("x", json!(1))])))
            .await
            .unwrap();
        assert_eq!(engine.get("x"), Some(json!(5)));

        let mirror = engine.default([("y", json!(2)), ("x", json!(9))]);
        assert_eq!(mirror.get("x"), Some(&json!(5)));
        assert_eq!(mirror.get("y"), Some(&json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_coalesce_into_one_flush() {
        let store = Arc::new(RecordingStore::new());
        let engine = ready_engine(store.clone()).await;

        engine.set("a", 1);
        engine.set("a", 2);
        engine.set("b", 3);
        engine.tick();
        assert!(engine.flush_pending());
        assert!(store.take_calls().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!engine.flush_pending());
        assert_eq!(
            store.take_calls(),
            vec![
                Call::SetItem("a".into(), "2".into()),
                Call::SetItem("b".into(), "3".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn init_schedules_a_flush_of_defaults() {
        let store = Arc::new(RecordingStore::new());
        let engine = MirrorEngine::new(store.clone());
        engine
            .init(options().with_defaults(mirror_from([("theme", json!("light"))])))
            .await
            .unwrap();
        assert!(engine.flush_pending());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.get_item("theme").as_deref(), Some("\"light\""));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_store_and_applies_defaults() {
        let store = Arc::new(RecordingStore::with_rows([("a", "1"), ("b", "2")]));
        let engine = ready_engine(store.clone()).await;
        engine.set("$meta", true);

        let mirror = engine.reset([("c", json!(3))]);
        assert_eq!(mirror.get("c"), Some(&json!(3)));
        assert!(mirror.contains_key("$meta"));
        assert!(!mirror.contains_key("a"));

        engine.apply();
        assert_eq!(
            store.take_calls(),
            vec![Call::Clear, Call::SetItem("c".into(), "3".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lossy_values_keep_their_stored_form() {
        struct NoFloats;
        impl Codec for NoFloats {
            fn encode(&self, value: &Value) -> Result<String, MirrorError> {
                match value.as_f64() {
                    Some(n) if value.is_f64() => Ok(format!("{}", n as i64)),
                    _ => JsonCodec.encode(value),
                }
            }
            fn decode(&self, raw: &str) -> Result<Value, MirrorError> {
                JsonCodec.decode(raw)
            }
        }

        let store = Arc::new(RecordingStore::with_rows([("ratio", "1")]));
        let engine =
            MirrorEngine::with_settings(store.clone(), Arc::new(NoFloats), Duration::from_millis(100));
        engine.init(options()).await.unwrap();
        store.take_calls();

        engine.set("ratio", 1.5);
        let stats = engine.apply();
        assert_eq!(stats.rejected, 1);
        assert!(store.take_calls().is_empty());
        assert_eq!(store.get_item("ratio").as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_rows_are_skipped_on_hydration() {
        let store = Arc::new(RecordingStore::with_rows([("good", "1"), ("bad", "{nope")]));
        let engine = MirrorEngine::new(store.clone());
        let mirror = engine.init(options()).await.unwrap();
        assert_eq!(mirror, mirror_from([("good", json!(1))]));
    }

    #[tokio::test(start_paused = true)]
    async fn sync_overwrites_without_merging() {
        let store = Arc::new(RecordingStore::with_rows([("a", "1")]));
        let engine = ready_engine(store.clone()).await;
        engine.set("a", 10);
        engine.set("local", true);
        store.set_item("b", "2");

        assert_eq!(engine.sync(), 2);
        assert_eq!(engine.get("a"), Some(json!(1)));
        assert_eq!(engine.get("b"), Some(json!(2)));
        assert_eq!(engine.get("local"), Some(json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_init_returns_to_uninitialized() {
        let store = Arc::new(RecordingStore::failing_init());
        let engine = MirrorEngine::new(store);
        let mut phases = engine.subscribe();

        assert!(engine.init(options()).await.is_err());
        assert_eq!(engine.phase(), Phase::Uninitialized);
        assert!(phases.has_changed().unwrap());
        assert_eq!(*phases.borrow_and_update(), Phase::Uninitialized);
    }

    #[tokio::test(start_paused = true)]
    async fn init_notifies_ready_and_reports_migration() {
        let store = Arc::new(RecordingStore::new());
        let engine = MirrorEngine::new(store.clone());
        let mut phases = engine.subscribe();

        let source: MemorySource = [("app_theme", "\"dark\""), ("other", "\"x\"")]
            .into_iter()
            .collect();
        let mirror = engine
            .init(options().with_legacy_source(source, "app_"))
            .await
            .unwrap();

        phases.changed().await.unwrap();
        assert_eq!(*phases.borrow(), Phase::Ready);
        assert_eq!(mirror, mirror_from([("theme", json!("dark"))]));
        assert_eq!(engine.last_migration().unwrap().copied, ["theme"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_and_disarms_the_timer() {
        let store = Arc::new(RecordingStore::new());
        let engine = ready_engine(store.clone()).await;
        engine.set("k", "v");
        assert!(engine.flush_pending());

        engine.shutdown().await.unwrap();
        assert!(!engine.flush_pending());
        assert_eq!(
            store.take_calls(),
            vec![Call::SetItem("k".into(), "\"v\"".into()), Call::Flush]
        );

        // A second teardown has nothing to write.
        engine.shutdown().await.unwrap();
        assert_eq!(store.take_calls(), vec![Call::Flush]);
    }

    #[test]
    fn mutations_flush_inline_without_a_runtime() {
        let store = Arc::new(RecordingStore::new());
        let engine = MirrorEngine::new(store.clone());
        {
            let mut state = engine.state();
            state.phase = Phase::Ready;
        }
        engine.set("a", 1);
        assert_eq!(store.get_item("a").as_deref(), Some("1"));
        assert!(!engine.flush_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn update_and_remove_schedule_flushes() {
        let store = Arc::new(RecordingStore::with_rows([("n", "1")]));
        let engine = ready_engine(store.clone()).await;

        let old = engine.update(|m| m.insert("n".into(), json!(2)));
        assert_eq!(old, Some(json!(1)));
        assert!(engine.flush_pending());
        engine.apply();
        assert!(engine.remove("missing").is_none());
        assert!(!engine.flush_pending());
        assert!(engine.contains_key("n"));
        assert_eq!(engine.keys(), ["n"]);
    }
}
