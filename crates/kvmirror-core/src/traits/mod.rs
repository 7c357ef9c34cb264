// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Storage backends extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod legacy;
pub mod storage;

pub use adapter::PluginAdapter;
pub use legacy::LegacySource;
pub use storage::{KeyValueStorage, StoreOptions};
