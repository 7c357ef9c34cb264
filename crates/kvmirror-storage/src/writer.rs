// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered write queue for fire-and-forget statements.
//!
//! Callers of the synchronous storage API cannot await their statements, so
//! each mutation is enqueued here and executed by one background task in
//! issue order. Failures are logged, broadcast to subscribers, and reported
//! by the next [`WriteQueue::flush`].

use kvmirror_core::{MirrorError, WriteFailure, WriteKind};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::database::Database;
use crate::queries::kv;

/// Capacity of the failure broadcast; slow subscribers see `Lagged`.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// A statement against the key/value table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Upsert { key: String, value: String },
    Delete { key: String },
    Clear,
}

impl WriteOp {
    fn kind(&self) -> WriteKind {
        match self {
            Self::Upsert { .. } => WriteKind::Upsert,
            Self::Delete { .. } => WriteKind::Delete,
            Self::Clear => WriteKind::Clear,
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            Self::Upsert { key, .. } | Self::Delete { key } => Some(key),
            Self::Clear => None,
        }
    }
}

enum Command {
    Write(WriteOp),
    /// Answered once every earlier command has run, with the first failure
    /// since the previous barrier.
    Barrier(oneshot::Sender<Option<WriteFailure>>),
    /// Answered once every earlier command has run; failures stay pending.
    Settle(oneshot::Sender<()>),
}

/// Handle to the background writer for one table.
///
/// Dropping the last handle closes the channel; queued statements still run
/// before the task exits.
#[derive(Debug)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Command>,
    failures: broadcast::Sender<WriteFailure>,
}

impl WriteQueue {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(db: Database, table: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        tokio::spawn(run(db, table, rx, failures.clone()));
        Self { tx, failures }
    }

    /// Queue a statement without waiting for it.
    pub fn enqueue(&self, op: WriteOp) {
        if let Err(mpsc::error::SendError(cmd)) = self.tx.send(Command::Write(op)) {
            if let Command::Write(op) = cmd {
                warn!(kind = %op.kind(), key = ?op.key(), "write queue closed, statement dropped");
            }
        }
    }

    /// Wait until every statement queued before this call has executed.
    ///
    /// Returns the first failure observed since the previous flush.
    pub async fn flush(&self) -> Result<(), MirrorError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Barrier(done_tx))
            .map_err(|_| MirrorError::Internal("write queue closed".into()))?;
        match done_rx.await {
            Ok(None) => Ok(()),
            Ok(Some(failure)) => Err(MirrorError::query(failure)),
            Err(_) => Err(MirrorError::Internal(
                "write queue stopped before flushing".into(),
            )),
        }
    }

    /// Wait until every statement queued before this call has executed,
    /// leaving any failure for the next [`WriteQueue::flush`] to report.
    pub async fn settle(&self) -> Result<(), MirrorError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Settle(done_tx))
            .map_err(|_| MirrorError::Internal("write queue closed".into()))?;
        done_rx
            .await
            .map_err(|_| MirrorError::Internal("write queue stopped before settling".into()))
    }

    /// Subscribe to failures of statements whose callers have moved on.
    pub fn subscribe(&self) -> broadcast::Receiver<WriteFailure> {
        self.failures.subscribe()
    }
}

async fn run(
    db: Database,
    table: String,
    mut rx: mpsc::UnboundedReceiver<Command>,
    failures: broadcast::Sender<WriteFailure>,
) {
    let mut first_failure: Option<WriteFailure> = None;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Write(op) => {
                let result = match &op {
                    WriteOp::Upsert { key, value } => kv::upsert(&db, &table, key, value).await,
                    WriteOp::Delete { key } => kv::delete(&db, &table, key).await,
                    WriteOp::Clear => kv::delete_all(&db, &table).await,
                };
                match result {
                    Ok(()) => debug!(table = %table, kind = %op.kind(), key = ?op.key(), "write applied"),
                    Err(e) => {
                        warn!(table = %table, kind = %op.kind(), key = ?op.key(), error = %e, "write failed");
                        let failure = WriteFailure {
                            kind: op.kind(),
                            key: op.key().map(str::to_string),
                            message: e.to_string(),
                        };
                        // No subscribers is fine.
                        let _ = failures.send(failure.clone());
                        first_failure.get_or_insert(failure);
                    }
                }
            }
            Command::Barrier(done) => {
                let _ = done.send(first_failure.take());
            }
            Command::Settle(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!(table = %table, "write queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Database, WriteQueue) {
        let db = Database::open_in_memory().await.unwrap();
        kv::create_table(&db, "kv").await.unwrap();
        let queue = WriteQueue::spawn(db.clone(), "kv".to_string());
        (db, queue)
    }

    fn upsert(key: &str, value: &str) -> WriteOp {
        WriteOp::Upsert {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn statements_run_in_issue_order() {
        let (db, queue) = setup().await;
        queue.enqueue(upsert("a", "1"));
        queue.enqueue(upsert("a", "2"));
        queue.enqueue(WriteOp::Delete { key: "a".into() });
        queue.enqueue(upsert("a", "3"));
        queue.flush().await.unwrap();

        let rows = kv::select_all(&db, "kv").await.unwrap();
        assert_eq!(rows, vec![("a".to_string(), "3".to_string())]);
    }

    #[tokio::test]
    async fn flush_reports_first_failure_once() {
        let db = Database::open_in_memory().await.unwrap();
        // No table: every statement fails.
        let queue = WriteQueue::spawn(db, "missing".to_string());
        let mut failures = queue.subscribe();

        queue.enqueue(upsert("a", "1"));
        queue.enqueue(WriteOp::Clear);

        let err = queue.flush().await.unwrap_err();
        assert!(err.to_string().contains("upsert `a` failed"), "got {err}");
        queue.flush().await.unwrap();

        let first = failures.recv().await.unwrap();
        assert_eq!(first.kind, WriteKind::Upsert);
        assert_eq!(first.key.as_deref(), Some("a"));
        let second = failures.recv().await.unwrap();
        assert_eq!(second.kind, WriteKind::Clear);
        assert_eq!(second.key, None);
    }

    #[tokio::test]
    async fn settle_keeps_failure_for_next_flush() {
        let db = Database::open_in_memory().await.unwrap();
        let queue = WriteQueue::spawn(db, "missing".to_string());

        queue.enqueue(upsert("a", "1"));
        queue.settle().await.unwrap();
        queue.settle().await.unwrap();

        let err = queue.flush().await.unwrap_err();
        assert!(err.to_string().contains("upsert `a` failed"), "got {err}");
        queue.flush().await.unwrap();
    }

    #[tokio::test]
    async fn flush_on_empty_queue_is_ok() {
        let (_db, queue) = setup().await;
        queue.flush().await.unwrap();
    }
}
