// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source of entries for the one-time legacy import.

use crate::error::MirrorError;

/// An ordered, synchronous, flat key-value source.
///
/// Consumed read-then-delete during migration only.
pub trait LegacySource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key at `index`, or `None` past the end.
    fn key(&self, index: usize) -> Option<String>;

    fn get_item(&self, key: &str) -> Option<String>;

    /// Delete `key` from the source.
    fn remove_item(&mut self, key: &str) -> Result<(), MirrorError>;
}
