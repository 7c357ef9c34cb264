// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for kvmirror integration tests.
//!
//! # Components
//!
//! - [`RecordingStore`] - in-memory adapter that logs every mutating call
//! - [`TestHarness`] - engine over a temporary SQLite database

pub mod harness;
pub mod recording;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use recording::{Call, RecordingStore};
