// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for kvmirror.

use thiserror::Error;

/// The primary error type used across the storage adapters and the sync engine.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The backing store could not be opened or is unreachable.
    #[error("connection error: {source}")]
    Connection {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A statement failed against an open connection.
    #[error("query error: {source}")]
    Query {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No backing store is available in the current environment.
    #[error("backing store unsupported: {0}")]
    Unsupported(String),

    /// A value could not be encoded or decoded by the configured codec.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid options or configuration values.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading from or writing back to a legacy source failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MirrorError {
    /// Wraps any driver error as a [`MirrorError::Connection`].
    pub fn connection<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            source: Box::new(err),
        }
    }

    /// Wraps any driver error as a [`MirrorError::Query`].
    pub fn query<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Query {
            source: Box::new(err),
        }
    }

    /// Returns `true` for errors raised by the backing store itself.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Query { .. })
    }
}
