// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./kvmirror.toml` > `~/.config/kvmirror/kvmirror.toml` > `/etc/kvmirror/kvmirror.toml`
//! with environment variable overrides via `KVMIRROR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MirrorConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/kvmirror/kvmirror.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "kvmirror.toml";

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("kvmirror/kvmirror.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/kvmirror/kvmirror.toml` (system-wide)
/// 3. `~/.config/kvmirror/kvmirror.toml` (user XDG config)
/// 4. `./kvmirror.toml` (local directory)
/// 5. `KVMIRROR_*` environment variables
pub fn load_config() -> Result<MirrorConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<MirrorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MirrorConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MirrorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MirrorConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MirrorConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider mapping `KVMIRROR_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `KVMIRROR_STORAGE_DATABASE_PATH` must map to
/// `storage.database_path`, not `storage.database.path`. Only the leading
/// section is mapped, so `KVMIRROR_LEGACY_LOCAL_STORAGE_PREFIX` stays
/// `legacy.local_storage_prefix`.
fn env_provider() -> Env {
    Env::prefixed("KVMIRROR_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a prefix-stripped env var name, in any case, to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ["storage", "sync", "legacy"] {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
