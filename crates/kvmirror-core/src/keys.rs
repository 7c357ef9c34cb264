// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reserved key names.
//!
//! Keys starting with `$` or `_`, and the literal `length`, name control
//! fields in stores shared with older clients. They are never persisted,
//! hydrated, or enumerated as data.

/// Leading characters that mark a key as reserved.
pub const RESERVED_PREFIXES: [char; 2] = ['$', '_'];

/// Exact names that are reserved.
pub const RESERVED_NAMES: [&str; 1] = ["length"];

/// Returns `true` if `key` names a control field rather than user data.
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIXES) || RESERVED_NAMES.contains(&key)
}

/// Returns `true` if `key` may be persisted.
pub fn is_data_key(key: &str) -> bool {
    !key.is_empty() && !is_reserved_key(key)
}
