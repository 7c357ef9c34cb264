// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, SQL-safe table names, and bounded intervals.

use crate::diagnostic::ConfigError;
use crate::model::MirrorConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Longest accepted coalescing window.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MirrorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log_level `{}` must be one of {}",
                config.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // The table name is interpolated into SQL, so it must be a bare identifier.
    if !is_sql_identifier(&config.storage.table) {
        errors.push(ConfigError::Validation {
            message: format!(
                "storage.table `{}` must start with a letter or underscore and contain only letters, digits, and underscores",
                config.storage.table
            ),
        });
    }

    if config.sync.debounce_ms == 0 || config.sync.debounce_ms > MAX_DEBOUNCE_MS {
        errors.push(ConfigError::Validation {
            message: format!(
                "sync.debounce_ms must be between 1 and {MAX_DEBOUNCE_MS}, got {}",
                config.sync.debounce_ms
            ),
        });
    }

    if config
        .legacy
        .source_path
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        errors.push(ConfigError::Validation {
            message: "legacy.source_path must not be empty when set".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Returns `true` if `name` is safe to splice into a statement as a table name.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
