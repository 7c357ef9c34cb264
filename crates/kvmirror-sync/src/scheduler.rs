// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced flush scheduling.
//!
//! A [`FlushScheduler`] holds at most one pending flush. The first request
//! arms a timer for the coalescing window; further requests are ignored
//! until the pending flush runs or is cancelled.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default coalescing window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct FlushScheduler {
    window: Duration,
    pending: Arc<Mutex<Option<CancellationToken>>>,
}

fn lock(pending: &Mutex<Option<CancellationToken>>) -> MutexGuard<'_, Option<CancellationToken>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl FlushScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether a flush is armed and has not run yet.
    pub fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Arm `flush` to run after the window.
    ///
    /// Returns `false` if a flush was already pending, in which case `flush`
    /// is dropped. The pending slot is released just before `flush` runs.
    /// Outside a tokio runtime `flush` runs immediately.
    pub fn request<F>(&self, flush: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let token = {
            let mut pending = lock(&self.pending);
            if pending.is_some() {
                trace!("flush already pending");
                return false;
            }
            let token = CancellationToken::new();
            *pending = Some(token.clone());
            token
        };

        match Handle::try_current() {
            Ok(handle) => {
                let window = self.window;
                let pending = Arc::clone(&self.pending);
                handle.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => trace!("pending flush cancelled"),
                        _ = tokio::time::sleep(window) => {
                            {
                                let mut slot = lock(&pending);
                                // A cancelled token was already taken out of the slot by cancel().
                                if token.is_cancelled() {
                                    return;
                                }
                                *slot = None;
                            }
                            flush();
                        }
                    }
                });
            }
            Err(_) => {
                lock(&self.pending).take();
                flush();
            }
        }
        true
    }

    /// Disarm the pending flush, if any, so it never fires.
    ///
    /// Returns whether a flush was pending.
    pub fn cancel(&self) -> bool {
        match lock(&self.pending).take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}
