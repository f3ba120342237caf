//! Buffered match records awaiting a batch flush.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::recorder::{record_matches_batch, MatchRecord, MatchRecorder, PersistenceError};

struct FlushState {
    rx: mpsc::Receiver<MatchRecord>,
    /// Records drained from the queue but not yet persisted.
    retry: Vec<MatchRecord>,
}

/// Bounded multi-producer queue of match records with a single flusher.
///
/// Producers never block: a full queue drops the record with a warning.
/// Records from a failed flush stay in the retry buffer for the next one.
pub(crate) struct PendingBatch {
    tx: mpsc::Sender<MatchRecord>,
    state: Mutex<FlushState>,
    capacity: usize,
}

impl PendingBatch {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            state: Mutex::new(FlushState {
                rx,
                retry: Vec::new(),
            }),
            capacity,
        }
    }

    /// Queue a record; returns `false` if it had to be dropped.
    pub(crate) fn push(&self, record: MatchRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                warn!(
                    profile_id = record.profile_id,
                    killmail_id = record.killmail_id(),
                    "pending match queue full, dropping record"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Records waiting in the queue (excluding the retry buffer).
    pub(crate) fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Drain the queue and persist everything outstanding in one batch.
    pub(crate) async fn flush(&self, recorder: &dyn MatchRecorder) -> Result<usize, PersistenceError> {
        let mut state = self.state.lock().await;
        while let Ok(record) = state.rx.try_recv() {
            state.retry.push(record);
        }

        if state.retry.len() > self.capacity {
            let excess = state.retry.len() - self.capacity;
            warn!(dropped = excess, "retry buffer over capacity, dropping oldest records");
            state.retry.drain(..excess);
        }
        if state.retry.is_empty() {
            return Ok(0);
        }

        match record_matches_batch(recorder, &state.retry).await {
            Ok(()) => {
                let flushed = state.retry.len();
                state.retry.clear();
                info!(records = flushed, "flushed match batch");
                Ok(flushed)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retained = state.retry.len(),
                    "match batch flush failed, will retry"
                );
                Err(e)
            }
        }
    }

    pub(crate) async fn retained(&self) -> usize {
        self.state.lock().await.retry.len()
    }
}
