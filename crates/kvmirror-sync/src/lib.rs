// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dirty-mirror synchronization for kvmirror.
//!
//! A [`MirrorEngine`] keeps an in-memory [`Mirror`] consistent with a
//! [`KeyValueStorage`](kvmirror_core::KeyValueStorage) adapter: it hydrates
//! the mirror on init, merges defaults, optionally imports a legacy flat
//! store, and flushes changes in debounced batches.

pub mod bootstrap;
pub mod engine;
pub mod legacy;
pub mod mirror;
pub mod scheduler;
pub mod teardown;

pub use bootstrap::{InitOptions, MigrationReport, migrate};
pub use engine::{FlushStats, MirrorEngine};
pub use legacy::{JsonFileSource, MemorySource};
pub use mirror::{Mirror, mirror_from};
pub use scheduler::{DEFAULT_DEBOUNCE, FlushScheduler};
pub use teardown::{flush_on_shutdown, install_signal_handler};
