// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Initialization options and the one-time legacy import.

use std::fmt;

use serde_json::Value;
use tracing::{debug, info, warn};

use kvmirror_config::model::MirrorConfig;
use kvmirror_core::{Codec, LegacySource, MirrorError, StoreOptions, is_data_key};

use crate::legacy::JsonFileSource;
use crate::mirror::Mirror;

/// Everything [`MirrorEngine::init`](crate::MirrorEngine::init) needs.
pub struct InitOptions {
    /// Where the adapter opens its table.
    pub store: StoreOptions,
    /// Values applied with `default` after hydration.
    pub defaults: Mirror,
    /// Import entries from `legacy_source` during init.
    pub copy_local_storage: bool,
    /// Only legacy keys starting with this prefix are imported; the prefix
    /// is stripped. Empty imports everything.
    pub local_storage_prefix: String,
    legacy_source: Option<Box<dyn LegacySource + Send>>,
}

impl fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitOptions")
            .field("store", &self.store)
            .field("defaults", &self.defaults)
            .field("copy_local_storage", &self.copy_local_storage)
            .field("local_storage_prefix", &self.local_storage_prefix)
            .field("legacy_source", &self.legacy_source.is_some())
            .finish()
    }
}

impl InitOptions {
    pub fn new(store: StoreOptions) -> Self {
        Self {
            store,
            defaults: Mirror::new(),
            copy_local_storage: false,
            local_storage_prefix: String::new(),
            legacy_source: None,
        }
    }

    /// Options from a loaded configuration.
    ///
    /// Opens `legacy.source_path` when legacy import is enabled.
    pub fn from_config(config: &MirrorConfig) -> Result<Self, MirrorError> {
        let mut options = Self::new(config.storage.store_options());
        if config.legacy.copy_local_storage {
            let path = config.legacy.source_path.as_deref().ok_or_else(|| {
                MirrorError::Config(
                    "legacy.copy_local_storage requires legacy.source_path".to_string(),
                )
            })?;
            options = options.with_legacy_source(
                JsonFileSource::open(path)?,
                config.legacy.local_storage_prefix.clone(),
            );
        }
        Ok(options)
    }

    pub fn with_defaults(mut self, defaults: Mirror) -> Self {
        self.defaults = defaults;
        self
    }

    /// Enable the legacy import from `source`, filtered by `prefix`.
    pub fn with_legacy_source(
        mut self,
        source: impl LegacySource + Send + 'static,
        prefix: impl Into<String>,
    ) -> Self {
        self.copy_local_storage = true;
        self.local_storage_prefix = prefix.into();
        self.legacy_source = Some(Box::new(source));
        self
    }

    pub(crate) fn take_legacy_source(&mut self) -> Option<Box<dyn LegacySource + Send>> {
        self.legacy_source.take()
    }

    pub(crate) fn check(&self) -> Result<(), MirrorError> {
        if self.copy_local_storage && self.legacy_source.is_none() {
            return Err(MirrorError::Config(
                "copy_local_storage is enabled but no legacy source was given".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a legacy import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Mirror keys written, prefix stripped.
    pub copied: Vec<String>,
    /// Source keys that matched the prefix but were left in the source.
    pub skipped: Vec<String>,
}

/// Copy matching entries of `source` into `mirror`, then delete them from
/// the source.
///
/// Entries are deleted only after every match has been copied. An entry
/// that does not decode, or whose stripped key is reserved or empty, stays
/// in the source and is reported as skipped.
pub fn migrate(
    mirror: &mut Mirror,
    source: &mut dyn LegacySource,
    prefix: &str,
    codec: &dyn Codec,
) -> MigrationReport {
    let mut report = MigrationReport::default();
    let mut copied_from = Vec::new();

    for i in 0..source.len() {
        let Some(key) = source.key(i) else { continue };
        let Some(target) = key.strip_prefix(prefix) else {
            continue;
        };
        if !is_data_key(target) {
            debug!(key = %key, "legacy key maps to a reserved name, skipped");
            report.skipped.push(key);
            continue;
        }
        let Some(raw) = source.get_item(&key) else {
            continue;
        };
        match codec.decode(&raw) {
            Ok(value) => {
                mirror.insert(target.to_string(), value);
                report.copied.push(target.to_string());
                copied_from.push(key);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "legacy value does not decode, left in place");
                report.skipped.push(key);
            }
        }
    }

    for key in &copied_from {
        if let Err(e) = source.remove_item(key) {
            warn!(key = %key, error = %e, "failed to delete migrated legacy entry");
        }
    }

    info!(
        copied = report.copied.len(),
        skipped = report.skipped.len(),
        prefix = %prefix,
        "legacy import finished"
    );
    report
}

/// Set each data key of `items` that `mirror` does not have yet.
///
/// Returns whether anything was inserted.
pub(crate) fn apply_defaults<I, K>(mirror: &mut Mirror, items: I) -> bool
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let mut changed = false;
    for (key, value) in items {
        let key = key.into();
        if !is_data_key(&key) || mirror.contains_key(&key) {
            continue;
        }
        mirror.insert(key, value);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::MemorySource;
    use crate::mirror::mirror_from;
    use kvmirror_core::JsonCodec;
    use serde_json::json;

    #[test]
    fn prefix_filters_and_strips() {
        let mut source: MemorySource = [("app_theme", "\"dark\""), ("other", "\"x\"")]
            .into_iter()
            .collect();
        let mut mirror = Mirror::new();

        let report = migrate(&mut mirror, &mut source, "app_", &JsonCodec);

        assert_eq!(mirror, mirror_from([("theme", json!("dark"))]));
        assert_eq!(report.copied, ["theme"]);
        assert!(report.skipped.is_empty());
        assert_eq!(source.len(), 1);
        assert_eq!(source.get_item("other").as_deref(), Some("\"x\""));
        assert_eq!(source.get_item("app_theme"), None);
    }

    #[test]
    fn empty_prefix_imports_everything() {
        let mut source: MemorySource = [("a", "1"), ("b", "[true]")].into_iter().collect();
        let mut mirror = mirror_from([("a", json!(0))]);

        let report = migrate(&mut mirror, &mut source, "", &JsonCodec);

        assert_eq!(mirror, mirror_from([("a", json!(1)), ("b", json!([true]))]));
        assert_eq!(report.copied, ["a", "b"]);
        assert!(source.is_empty());
    }

    #[test]
    fn undecodable_and_reserved_entries_stay_in_source() {
        let mut source: MemorySource = [("app_ok", "1"), ("app_bad", "{oops"), ("app_$x", "2")]
            .into_iter()
            .collect();
        let mut mirror = Mirror::new();

        let report = migrate(&mut mirror, &mut source, "app_", &JsonCodec);

        assert_eq!(report.copied, ["ok"]);
        assert_eq!(report.skipped, ["app_bad", "app_$x"]);
        assert_eq!(mirror.len(), 1);
        assert_eq!(source.len(), 2);
        assert!(source.get_item("app_bad").is_some());
    }

    #[test]
    fn defaults_never_override() {
        let mut mirror = mirror_from([("x", json!(5))]);
        assert!(!apply_defaults(&mut mirror, [("x", json!(1))]));
        assert_eq!(mirror["x"], json!(5));
        assert!(apply_defaults(&mut mirror, [("y", json!(2)), ("$z", json!(3))]));
        assert_eq!(mirror["y"], json!(2));
        assert!(!mirror.contains_key("$z"));
    }

    #[test]
    fn init_options_require_a_source_when_importing() {
        let mut options = InitOptions::new(StoreOptions::new("/tmp/kv.db", "kv"));
        options.check().unwrap();
        options.copy_local_storage = true;
        assert!(matches!(options.check(), Err(MirrorError::Config(_))));

        let options = InitOptions::new(StoreOptions::new("/tmp/kv.db", "kv"))
            .with_legacy_source(MemorySource::new(), "app_");
        options.check().unwrap();
        assert_eq!(options.local_storage_prefix, "app_");
    }

    #[test]
    fn from_config_opens_the_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, r#"{"app_a": "1"}"#).unwrap();

        let mut config = MirrorConfig::default();
        config.storage.table = "kv".into();
        config.legacy.copy_local_storage = true;
        config.legacy.local_storage_prefix = "app_".into();
        config.legacy.source_path = Some(path.display().to_string());

        let mut options = InitOptions::from_config(&config).unwrap();
        assert!(options.copy_local_storage);
        assert_eq!(options.store.table, "kv");
        let source = options.take_legacy_source().unwrap();
        assert_eq!(source.len(), 1);

        config.legacy.source_path = None;
        assert!(matches!(
            InitOptions::from_config(&config),
            Err(MirrorError::Config(_))
        ));
    }
}
