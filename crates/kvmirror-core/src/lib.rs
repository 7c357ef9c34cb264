// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for kvmirror.
//!
//! This crate provides the error taxonomy, the value codec contract, the
//! reserved-key rules, and the adapter traits shared by the storage backends
//! and the sync engine.

pub mod codec;
pub mod error;
pub mod keys;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use codec::{Codec, JsonCodec};
pub use error::MirrorError;
pub use keys::{is_data_key, is_reserved_key};
pub use types::{BackendKind, HealthStatus, Phase, WriteFailure, WriteKind};

pub use traits::{KeyValueStorage, LegacySource, PluginAdapter, StoreOptions};
