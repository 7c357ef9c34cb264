// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flat key/value sources for the one-time legacy import.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use kvmirror_core::{LegacySource, MirrorError};

/// Ordered in-memory source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySource {
    entries: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`, keeping its position if present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut source = Self::new();
        for (k, v) in iter {
            source.insert(k, v);
        }
        source
    }
}

impl LegacySource for MemorySource {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.entries.get(index).map(|(k, _)| k.clone())
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), MirrorError> {
        self.entries.retain(|(k, _)| k != key);
        Ok(())
    }
}

/// A JSON object on disk, one member per entry.
///
/// String members are returned verbatim; any other member is returned as
/// its JSON text. Every removal rewrites the file.
#[derive(Debug)]
pub struct JsonFileSource {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileSource {
    /// Read the object at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MirrorError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            MirrorError::Migration(format!("cannot read {}: {e}", path.display()))
        })?;
        let entries: Map<String, Value> = serde_json::from_str(&content).map_err(|e| {
            MirrorError::Migration(format!(
                "{} is not a JSON object of entries: {e}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), entries = entries.len(), "legacy source opened");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_back(&self) -> Result<(), MirrorError> {
        let body = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| MirrorError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, body).map_err(|e| {
            MirrorError::Migration(format!("cannot write {}: {e}", self.path.display()))
        })
    }
}

impl LegacySource for JsonFileSource {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.entries.keys().nth(index).cloned()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn remove_item(&mut self, key: &str) -> Result<(), MirrorError> {
        if self.entries.shift_remove(key).is_some() {
            self.write_back()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_keeps_order_and_replaces_in_place() {
        let mut source: MemorySource = [("b", "1"), ("a", "2")].into_iter().collect();
        source.insert("b", "3");
        assert_eq!(source.len(), 2);
        assert_eq!(source.key(0).as_deref(), Some("b"));
        assert_eq!(source.get_item("b").as_deref(), Some("3"));
        assert_eq!(source.key(2), None);

        source.remove_item("b").unwrap();
        assert_eq!(source.key(0).as_deref(), Some("a"));
        source.remove_item("missing").unwrap();
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn json_file_source_reads_and_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, r#"{"app_theme": "\"dark\"", "app_count": 3, "other": "x"}"#)
            .unwrap();

        let mut source = JsonFileSource::open(&path).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.key(0).as_deref(), Some("app_theme"));
        assert_eq!(source.get_item("app_theme").as_deref(), Some("\"dark\""));
        assert_eq!(source.get_item("app_count").as_deref(), Some("3"));
        assert_eq!(source.get_item("other").as_deref(), Some("x"));

        source.remove_item("app_theme").unwrap();
        let reread = JsonFileSource::open(&path).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread.get_item("app_theme"), None);
        assert_eq!(reread.key(0).as_deref(), Some("app_count"));
    }

    #[test]
    fn json_file_source_errors_are_migration_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFileSource::open(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, MirrorError::Migration(_)));

        let path = dir.path().join("array.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let not_object = JsonFileSource::open(&path).unwrap_err();
        assert!(matches!(not_object, MirrorError::Migration(_)));
    }
}
