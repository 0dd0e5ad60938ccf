//! Background persistence for cart snapshots.
//!
//! One task owns every write to the durable store. Snapshots arrive over an
//! unbounded channel in the order the mutations were applied, so the last
//! write to land is always the latest state. Callers get a [`PendingWrite`]
//! they may await or drop.

use std::sync::Arc;

use cafe_loyalty_core::CartLineItem;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::storage::{KeyValueStore, StorageError};

/// Errors persisting a cart snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Store rejected the write.
    #[error("cart snapshot write failed: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot could not be encoded.
    #[error("cart snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The writer task is gone (runtime shutting down).
    #[error("cart writer stopped before the snapshot was written")]
    WriterStopped,
}

/// Outcome of one queued snapshot write.
///
/// The in-memory mutation has already happened when this is returned.
/// Awaiting [`PendingWrite::wait`] reports whether the snapshot reached the
/// durable store; dropping it leaves the write running in the background.
#[derive(Debug)]
pub struct PendingWrite {
    rx: oneshot::Receiver<Result<(), PersistError>>,
}

impl PendingWrite {
    /// A handle that reports [`PersistError::WriterStopped`].
    pub(crate) fn closed() -> Self {
        let (_, rx) = oneshot::channel();
        Self { rx }
    }

    /// Wait for the snapshot write to finish.
    ///
    /// # Errors
    ///
    /// Returns the storage or encoding error the write hit, or
    /// [`PersistError::WriterStopped`] if the writer went away first.
    pub async fn wait(self) -> Result<(), PersistError> {
        self.rx.await.unwrap_or(Err(PersistError::WriterStopped))
    }
}

enum Job {
    Write {
        key: String,
        items: Vec<CartLineItem>,
        done: oneshot::Sender<Result<(), PersistError>>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the writer task. The task exits once every handle is dropped
/// and the queue has drained.
#[derive(Debug)]
pub(crate) struct Writer {
    tx: mpsc::UnboundedSender<Job>,
}

impl Writer {
    /// Spawn the writer on the current tokio runtime.
    pub(crate) fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, rx));
        Self { tx }
    }

    /// Queue a full snapshot for `key`. Never blocks.
    pub(crate) fn enqueue(&self, key: String, items: Vec<CartLineItem>) -> PendingWrite {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Job::Write { key, items, done }).is_err() {
            return PendingWrite::closed();
        }
        PendingWrite { rx }
    }

    /// Wait until every snapshot queued so far has been handled.
    pub(crate) async fn flush(&self) -> Result<(), PersistError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Job::Flush { done })
            .map_err(|_| PersistError::WriterStopped)?;
        rx.await.map_err(|_| PersistError::WriterStopped)
    }
}

async fn run(store: Arc<dyn KeyValueStore>, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        match job {
            Job::Write { key, items, done } => {
                let result = persist(store.as_ref(), &key, &items).await;
                match &result {
                    Ok(()) => debug!(%key, entries = items.len(), "cart snapshot persisted"),
                    Err(e) => warn!(%key, error = %e, "failed to persist cart snapshot"),
                }
                // Nobody waiting is fine.
                let _ = done.send(result);
            }
            Job::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
    debug!("cart writer stopped");
}

async fn persist(
    store: &dyn KeyValueStore,
    key: &str,
    items: &[CartLineItem],
) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec(items)?;
    store.set(key, &bytes).await?;
    Ok(())
}
