// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flush-on-exit coordination.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C) that cancel a
//! [`CancellationToken`], and runs a teardown flush of a [`MirrorEngine`]
//! once that token fires.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kvmirror_core::MirrorError;

use crate::engine::MirrorEngine;

/// Returns a token cancelled on SIGINT or SIGTERM.
///
/// If the SIGTERM handler cannot be installed, only Ctrl+C is watched.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), flushing mirror"),
                        _ = sigterm.recv() => info!("received SIGTERM, flushing mirror"),
                        _ = token_clone.cancelled() => return,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cannot install SIGTERM handler, watching Ctrl+C only");
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), flushing mirror"),
                        _ = token_clone.cancelled() => return,
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, flushing mirror"),
                _ = token_clone.cancelled() => return,
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Run [`MirrorEngine::shutdown`] once `token` is cancelled.
///
/// An apply already running completes first; the teardown flush then finds
/// nothing left to write.
pub fn flush_on_shutdown(
    engine: MirrorEngine,
    token: CancellationToken,
) -> JoinHandle<Result<(), MirrorError>> {
    tokio::spawn(async move {
        token.cancelled().await;
        let result = engine.shutdown().await;
        match &result {
            Ok(()) => debug!("teardown flush complete"),
            Err(e) => warn!(error = %e, "teardown flush failed"),
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kvmirror_core::{KeyValueStorage, StoreOptions};
    use kvmirror_test_utils::{Call, RecordingStore};

    use crate::bootstrap::InitOptions;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn cancellation_triggers_one_teardown_flush() {
        let store = Arc::new(RecordingStore::new());
        let engine = MirrorEngine::new(store.clone());
        engine
            .init(InitOptions::new(StoreOptions::new("/tmp/unused.db", "kv")))
            .await
            .unwrap();
        engine.set("k", 1);

        let token = CancellationToken::new();
        let handle = flush_on_shutdown(engine.clone(), token.clone());
        token.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(store.get_item("k").as_deref(), Some("1"));
        let calls = store.take_calls();
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::SetItem(..))).count(),
            1
        );
        assert!(!engine.flush_pending());
    }
}
