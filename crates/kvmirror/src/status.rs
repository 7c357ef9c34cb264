// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kvmirror status` command implementation.

use std::io::Write;

use serde::Serialize;

use kvmirror_config::model::MirrorConfig;
use kvmirror_core::{BackendKind, HealthStatus, MirrorError, Phase};
use kvmirror_sync::MirrorEngine;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub backend: BackendKind,
    pub supported: bool,
    pub phase: Phase,
    pub healthy: bool,
    pub health: String,
    pub database_path: String,
    pub table: String,
    pub entries: usize,
}

fn describe(health: &Result<HealthStatus, MirrorError>) -> (bool, String) {
    match health {
        Ok(HealthStatus::Healthy) => (true, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (false, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => (false, format!("unhealthy: {reason}")),
        Err(e) => (false, format!("unreachable: {e}")),
    }
}

/// Run the `kvmirror status` command.
pub async fn run_status(
    engine: &MirrorEngine,
    config: &MirrorConfig,
    json: bool,
    out: &mut dyn Write,
) -> Result<bool, MirrorError> {
    let (healthy, health) = describe(&engine.store().health_check().await);
    let status = StatusResponse {
        backend: engine.store().backend_kind(),
        supported: engine.supported(),
        phase: engine.phase(),
        healthy,
        health,
        database_path: config.storage.database_path.clone(),
        table: config.storage.table.clone(),
        entries: engine.keys().len(),
    };

    let write_err = |e: std::io::Error| MirrorError::Internal(format!("failed to write output: {e}"));
    if json {
        let body = serde_json::to_string_pretty(&status)
            .map_err(|e| MirrorError::Serialization(e.to_string()))?;
        writeln!(out, "{body}").map_err(write_err)?;
    } else {
        writeln!(out, "backend:  {} ({})", status.backend, status.health).map_err(write_err)?;
        writeln!(out, "database: {}", status.database_path).map_err(write_err)?;
        writeln!(out, "table:    {}", status.table).map_err(write_err)?;
        writeln!(out, "entries:  {}", status.entries).map_err(write_err)?;
        if !status.supported {
            writeln!(out, "warning:  nothing is persisted").map_err(write_err)?;
        }
    }
    Ok(status.healthy)
}
