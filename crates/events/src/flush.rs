//! Ordered, retrying write-behind queue for collection snapshots.
//!
//! In-memory state is always updated first; [`FlushQueue::enqueue`] then
//! hands a full snapshot to a background worker which writes it to the
//! [`KeyValueStore`]. Writes happen in enqueue order. When several snapshots
//! for the same key are waiting, only the newest is written. A failed write
//! is retried with exponential backoff and, if it still fails, logged as a
//! persistence failure; in-memory state is never rolled back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use salon_core::error::CoreError;
use salon_db::{KeyValueStore, StoreError};

/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry; doubled on each further retry.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct FlushConfig {
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base: DEFAULT_RETRY_BASE,
        }
    }
}

enum FlushMessage {
    Write { key: String, value: serde_json::Value },
    Barrier(oneshot::Sender<()>),
}

// ---------------------------------------------------------------------------
// FlushQueue
// ---------------------------------------------------------------------------

/// Cloneable handle to the flush worker.
#[derive(Clone)]
pub struct FlushQueue {
    sender: mpsc::UnboundedSender<FlushMessage>,
    failures: Arc<AtomicUsize>,
}

impl FlushQueue {
    /// Spawn the worker task. It exits once every handle has been dropped and
    /// the remaining queue has been written.
    pub fn spawn(store: Arc<dyn KeyValueStore>, config: FlushConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let failures = Arc::new(AtomicUsize::new(0));
        let worker = FlushWorker {
            store,
            config,
            failures: Arc::clone(&failures),
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender, failures }, handle)
    }

    /// Queue a snapshot of `value` for `key`.
    pub fn enqueue(&self, key: &str, value: serde_json::Value) {
        let msg = FlushMessage::Write {
            key: key.to_owned(),
            value,
        };
        if self.sender.send(msg).is_err() {
            tracing::error!(key, "Flush worker is gone, snapshot dropped");
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Serialize and queue a snapshot.
    pub fn enqueue_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => self.enqueue(key, v),
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to serialize snapshot");
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Wait until every snapshot queued before this call has been handled.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(FlushMessage::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Snapshots that could not be persisted, since start.
    pub fn failed_writes(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct FlushWorker {
    store: Arc<dyn KeyValueStore>,
    config: FlushConfig,
    failures: Arc<AtomicUsize>,
}

impl FlushWorker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<FlushMessage>) {
        while let Some(first) = receiver.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = receiver.try_recv() {
                batch.push(next);
            }

            for item in coalesce(batch) {
                match item {
                    FlushMessage::Write { key, value } => {
                        if let Err(e) = self.write(&key, value).await {
                            tracing::error!(
                                key = %key,
                                error = %e,
                                "Continuing in memory-only mode for this snapshot"
                            );
                            self.failures.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    FlushMessage::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
        }
        tracing::info!("Flush queue closed, worker shutting down");
    }

    /// Write one snapshot, retrying transient errors.
    async fn write(&self, key: &str, value: serde_json::Value) -> Result<(), CoreError> {
        let mut delay = self.config.retry_base;
        let mut attempt = 0;

        loop {
            match self.store.set(key, value.clone()).await {
                Ok(()) => {
                    tracing::debug!(key, attempt = attempt + 1, "Snapshot persisted");
                    return Ok(());
                }
                Err(e) if attempt < self.config.max_retries && is_retryable(&e) => {
                    tracing::warn!(
                        key,
                        attempt = attempt + 1,
                        error = %e,
                        "Snapshot write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(CoreError::PersistenceFailure(format!(
                        "writing '{key}' failed after {} attempt(s): {e}",
                        attempt + 1
                    )));
                }
            }
        }
    }
}

fn is_retryable(err: &StoreError) -> bool {
    !matches!(err, StoreError::InvalidKey(_) | StoreError::Serde(_))
}

/// Drop writes superseded by a later write to the same key. Barriers split
/// the batch: a write is only merged with later writes queued before the
/// next barrier, so every barrier still follows what was queued ahead of it.
fn coalesce(batch: Vec<FlushMessage>) -> Vec<FlushMessage> {
    let mut out: VecDeque<FlushMessage> = VecDeque::with_capacity(batch.len());
    for item in batch.into_iter().rev() {
        if let FlushMessage::Write { key, .. } = &item {
            let superseded = out
                .iter()
                .take_while(|later| !matches!(later, FlushMessage::Barrier(_)))
                .any(|later| matches!(later, FlushMessage::Write { key: k, .. } if k == key));
            if superseded {
                continue;
            }
        }
        out.push_front(item);
    }
    out.into()
}
