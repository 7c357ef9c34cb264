// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that every storage backend implements.

use async_trait::async_trait;

use crate::error::MirrorError;
use crate::types::{BackendKind, HealthStatus};

/// Identity, health, and lifecycle shared by all backends.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns which backing store this adapter drives.
    fn backend_kind(&self) -> BackendKind;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, MirrorError>;

    /// Gracefully shuts down the adapter, draining queued writes.
    async fn shutdown(&self) -> Result<(), MirrorError>;
}
