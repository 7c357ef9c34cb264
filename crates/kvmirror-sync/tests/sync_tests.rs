// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the sync engine over SQLite.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_test::traced_test;

use kvmirror_core::{KeyValueStorage, Phase, PluginAdapter, StoreOptions};
use kvmirror_storage::{NoopStore, SqliteKeyValueStore};
use kvmirror_sync::{InitOptions, JsonFileSource, MemorySource, MirrorEngine, mirror_from};
use kvmirror_test_utils::TestHarness;

#[tokio::test]
async fn values_survive_a_restart() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    assert!(harness.engine().mirror().is_empty());

    harness.engine().set("count", 1);
    harness.engine().persist().await.unwrap();

    let engine = harness.reopen().await.unwrap();
    assert_eq!(engine.get("count"), Some(json!(1)));
    assert_eq!(engine.phase(), Phase::Ready);
}

#[tokio::test]
async fn float_values_survive_a_restart() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    let sum = 0.1 + 0.2;
    harness.engine().set("sum", sum);
    harness.engine().set("price", 0.24285714285714285);
    harness.engine().set("nested", json!({"ratio": [0.9571428571428571, 1e-7]}));

    let stats = harness.engine().persist().await.unwrap();
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.written, 3);

    let engine = harness.reopen().await.unwrap();
    assert_eq!(engine.get("sum").and_then(|v| v.as_f64()), Some(sum));
    assert_eq!(engine.get("price"), Some(json!(0.24285714285714285)));
    assert_eq!(
        engine.get("nested"),
        Some(json!({"ratio": [0.9571428571428571, 1e-7]}))
    );
}

#[tokio::test]
async fn debounced_flush_reaches_the_database() {
    let harness = TestHarness::builder()
        .with_debounce(Duration::from_millis(20))
        .build()
        .await
        .unwrap();
    let engine = harness.engine();

    engine.set("a", "x");
    engine.set("b", json!({"nested": [1, 2]}));
    assert_eq!(harness.store().get_item("a"), None);

    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.store().flush().await.unwrap();
    assert_eq!(harness.store().get_item("a").as_deref(), Some("\"x\""));
    assert_eq!(
        harness.store().get_item("b").as_deref(),
        Some(r#"{"nested":[1,2]}"#)
    );
}

#[tokio::test]
async fn removals_and_reset_are_persisted() {
    let mut harness = TestHarness::builder().build().await.unwrap();
    harness.engine().set("keep", true);
    harness.engine().set("drop", true);
    harness.engine().persist().await.unwrap();

    harness.engine().remove("drop");
    harness.engine().persist().await.unwrap();
    let engine = harness.reopen().await.unwrap();
    assert_eq!(engine.keys(), ["keep"]);

    engine.reset([("fresh", json!(1))]);
    engine.persist().await.unwrap();
    let engine = harness.reopen().await.unwrap();
    assert_eq!(engine.mirror(), mirror_from([("fresh", json!(1))]));
}

#[tokio::test]
async fn defaults_apply_only_to_missing_keys_across_restarts() {
    let mut harness = TestHarness::builder()
        .with_defaults(mirror_from([("x", json!(1))]))
        .build()
        .await
        .unwrap();
    harness.engine().set("x", 5);
    harness.engine().persist().await.unwrap();

    let engine = harness.reopen().await.unwrap();
    let mirror = engine.default([("x", json!(1)), ("y", json!(2))]);
    assert_eq!(mirror.get("x"), Some(&json!(5)));
    assert_eq!(mirror.get("y"), Some(&json!(2)));
}

#[tokio::test]
async fn legacy_import_with_prefix() {
    let source: MemorySource = [("app_theme", "\"dark\""), ("other", "\"x\"")]
        .into_iter()
        .collect();
    let mut harness = TestHarness::builder()
        .with_legacy(source, "app_")
        .build()
        .await
        .unwrap();

    let report = harness.engine().last_migration().unwrap();
    assert_eq!(report.copied, ["theme"]);
    assert_eq!(harness.engine().get("theme"), Some(json!("dark")));
    assert_eq!(harness.engine().get("other"), None);

    // The init flush persists migrated values.
    let engine = harness.reopen().await.unwrap();
    assert_eq!(engine.get("theme"), Some(json!("dark")));
}

#[tokio::test]
async fn legacy_import_from_a_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = dir.path().join("legacy.json");
    std::fs::write(&legacy, r#"{"app_theme": "\"dark\"", "other": "\"x\""}"#).unwrap();

    let store = Arc::new(SqliteKeyValueStore::new());
    let engine = MirrorEngine::new(store.clone());
    let options = InitOptions::new(StoreOptions::new(dir.path().join("kv.db"), "kvstorage"))
        .with_legacy_source(JsonFileSource::open(&legacy).unwrap(), "app_");
    engine.init(options).await.unwrap();
    engine.shutdown().await.unwrap();

    assert_eq!(store.get_item("theme").as_deref(), Some("\"dark\""));
    let remaining: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&legacy).unwrap()).unwrap();
    assert_eq!(remaining, json!({"other": "\"x\""}));
}

#[tokio::test]
async fn reserved_rows_are_not_hydrated() {
    let dir = tempfile::tempdir().unwrap();
    let options = StoreOptions::new(dir.path().join("kv.db"), "kvstorage");
    {
        let store = SqliteKeyValueStore::new();
        store.init(&options).await.unwrap();
        store.set_item("$version", "2");
        store.set_item("length", "9");
        store.set_item("name", "\"kv\"");
        store.shutdown().await.unwrap();
    }

    let engine = MirrorEngine::new(Arc::new(SqliteKeyValueStore::new()));
    let mirror = engine.init(InitOptions::new(options)).await.unwrap();
    assert_eq!(mirror, mirror_from([("name", json!("kv"))]));
}

#[tokio::test]
async fn init_fails_for_an_unopenable_database() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MirrorEngine::new(Arc::new(SqliteKeyValueStore::new()));
    // A directory is not a database file.
    let err = engine
        .init(InitOptions::new(StoreOptions::new(dir.path(), "kvstorage")))
        .await
        .unwrap_err();
    assert!(err.is_backend(), "got {err:?}");
    assert_eq!(engine.phase(), Phase::Uninitialized);
}

#[tokio::test]
#[traced_test]
async fn unsupported_backend_warns_and_accepts_everything() {
    let engine = MirrorEngine::new(Arc::new(NoopStore::unsupported("no sqlite driver")));
    assert!(logs_contain("nothing will be persisted"));
    assert!(!engine.supported());

    engine
        .init(InitOptions::new(StoreOptions::new("/nonexistent/kv.db", "kv")))
        .await
        .unwrap();
    engine.set("a", 1);
    engine.persist().await.unwrap();
    engine.shutdown().await.unwrap();
    assert_eq!(engine.get("a"), Some(json!(1)));
}
