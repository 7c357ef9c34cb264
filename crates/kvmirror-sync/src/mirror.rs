// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory mirror and helpers that ignore reserved keys.

use serde_json::{Map, Value};

use kvmirror_core::is_data_key;

/// Live key/value object; insertion ordered.
pub type Mirror = Map<String, Value>;

/// Entries that are persisted, in mirror order.
pub fn data_entries(mirror: &Mirror) -> impl Iterator<Item = (&String, &Value)> {
    mirror.iter().filter(|(k, _)| is_data_key(k))
}

/// Structural equality restricted to data keys.
pub fn data_eq(a: &Mirror, b: &Mirror) -> bool {
    data_entries(a).count() == data_entries(b).count()
        && data_entries(a).all(|(k, v)| b.get(k) == Some(v))
}

/// Drop every data key, keeping reserved ones.
pub fn clear_data(mirror: &mut Mirror) {
    mirror.retain(|k, _| !is_data_key(k));
}

/// Build a mirror from `(key, value)` pairs.
pub fn mirror_from<I, K>(items: I) -> Mirror
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    items.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
