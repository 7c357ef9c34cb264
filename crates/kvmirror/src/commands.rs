// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data commands: get, set, remove, list, clear, import.
//!
//! Each returns `Ok(false)` when the command found nothing to act on, which
//! the binary turns into exit status 1.

use std::io::Write;

use serde_json::Value;

use kvmirror_core::MirrorError;
use kvmirror_sync::{Mirror, MirrorEngine};

fn write_err(e: std::io::Error) -> MirrorError {
    MirrorError::Internal(format!("failed to write output: {e}"))
}

pub fn get(engine: &MirrorEngine, key: &str, out: &mut dyn Write) -> Result<bool, MirrorError> {
    match engine.get(key) {
        Some(value) => {
            writeln!(out, "{value}").map_err(write_err)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub fn set(engine: &MirrorEngine, key: &str, raw: &str) -> Result<bool, MirrorError> {
    if !kvmirror_core::is_data_key(key) {
        return Err(MirrorError::Config(format!(
            "`{key}` is a reserved key and is never persisted"
        )));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| MirrorError::Serialization(format!("value is not valid JSON: {e}")))?;
    engine.set(key, value);
    Ok(true)
}

pub fn remove(engine: &MirrorEngine, key: &str) -> Result<bool, MirrorError> {
    Ok(engine.remove(key).is_some())
}

pub fn list(engine: &MirrorEngine, out: &mut dyn Write) -> Result<bool, MirrorError> {
    let mirror = engine.mirror();
    for key in engine.keys() {
        if let Some(value) = mirror.get(&key) {
            writeln!(out, "{key}\t{value}").map_err(write_err)?;
        }
    }
    Ok(true)
}

pub fn clear(engine: &MirrorEngine) -> Result<bool, MirrorError> {
    engine.reset(Mirror::new());
    Ok(true)
}

/// The import itself ran during init; report what it did.
pub fn import(engine: &MirrorEngine, out: &mut dyn Write) -> Result<bool, MirrorError> {
    let Some(report) = engine.last_migration() else {
        return Ok(false);
    };
    for key in &report.copied {
        writeln!(out, "imported {key}").map_err(write_err)?;
    }
    for key in &report.skipped {
        writeln!(out, "skipped {key}").map_err(write_err)?;
    }
    writeln!(
        out,
        "{} imported, {} skipped",
        report.copied.len(),
        report.skipped.len()
    )
    .map_err(write_err)?;
    Ok(true)
}
