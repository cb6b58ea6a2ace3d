use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{PersistedPosition, PositionStore},
    position::{PositionSignature, ReadingPosition},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

/// What a flush did with the pending position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Idle,
    Written,
    /// Same signature as the last successful write.
    Deduplicated,
    /// Empty snippet; never allowed to overwrite a saved position.
    Rejected,
    /// Store error. The position stays pending for the next flush.
    Failed,
}

struct SchedulerState {
    pending: Option<ReadingPosition>,
    /// Bumped on every `schedule`, so a flush only clears the pending slot it
    /// actually wrote.
    generation: u64,
    last_written: Option<PositionSignature>,
    timer: Option<JoinHandle<()>>,
    writes: u64,
}

struct SchedulerInner {
    book_id: String,
    store: Arc<dyn PositionStore>,
    debounce: Duration,
    signature_chars: usize,
    state: Mutex<SchedulerState>,
    /// Serializes flushes so dedup never races a concurrent write.
    flush_lock: Mutex<()>,
    cancel: CancellationToken,
}

/// Debounced, deduplicated writer for one book's position.
#[derive(Clone)]
pub struct PersistenceScheduler {
    inner: Arc<SchedulerInner>,
}

impl PersistenceScheduler {
    pub fn new(
        book_id: impl Into<String>,
        store: Arc<dyn PositionStore>,
        debounce: Duration,
        signature_chars: usize,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                book_id: book_id.into(),
                store,
                debounce,
                signature_chars,
                state: Mutex::new(SchedulerState {
                    pending: None,
                    generation: 0,
                    last_written: None,
                    timer: None,
                    writes: 0,
                }),
                flush_lock: Mutex::new(()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn book_id(&self) -> &str {
        &self.inner.book_id
    }

    /// Makes `position` the pending write and restarts the debounce timer.
    pub async fn schedule(&self, position: ReadingPosition) {
        let mut state = self.inner.state.lock().await;
        state.pending = Some(position);
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;

        if let Some(handle) = state.timer.take() {
            handle.abort();
        }

        if self.inner.cancel.is_cancelled() {
            return;
        }

        let scheduler = self.clone();
        let cancel = self.inner.cancel.clone();
        let debounce = self.inner.debounce;

        state.timer = Some(tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(debounce) => {}
                _ = cancel.cancelled() => return,
            }

            {
                let mut state = scheduler.inner.state.lock().await;
                if state.generation != generation {
                    return;
                }
                // Past this point the write must not be aborted mid-flight.
                state.timer = None;
            }

            scheduler.flush().await;
        }));
    }

    /// Cancels the debounce timer and writes whatever is pending, now.
    pub async fn force_flush_now(&self) -> FlushOutcome {
        {
            let mut state = self.inner.state.lock().await;
            if let Some(handle) = state.timer.take() {
                handle.abort();
            }
        }
        self.flush().await
    }

    async fn flush(&self) -> FlushOutcome {
        let _flushing = self.inner.flush_lock.lock().await;

        let (position, generation) = {
            let mut state = self.inner.state.lock().await;
            let Some(position) = state.pending.clone() else {
                return FlushOutcome::Idle;
            };

            if !position.has_sentence() {
                log_debug!(
                    "not persisting position without snippet for book {} (chapter {}, offset {})",
                    self.inner.book_id,
                    position.chapter_index,
                    position.chapter_char_offset
                );
                state.pending = None;
                return FlushOutcome::Rejected;
            }

            let signature = position.signature(self.inner.signature_chars);
            if state.last_written.as_ref() == Some(&signature) {
                state.pending = None;
                return FlushOutcome::Deduplicated;
            }

            (position, state.generation)
        };

        let record = PersistedPosition::from_position(&position);
        match self.inner.store.save(&self.inner.book_id, &record).await {
            Ok(()) => {
                let mut state = self.inner.state.lock().await;
                state.last_written = Some(position.signature(self.inner.signature_chars));
                state.writes += 1;
                if state.generation == generation {
                    state.pending = None;
                }
                log_debug!(
                    "saved position for book {}: chapter {} offset {} ({:.1}%)",
                    self.inner.book_id,
                    position.chapter_index,
                    position.chapter_char_offset,
                    position.total_progress
                );
                FlushOutcome::Written
            }
            Err(err) => {
                log_error!(
                    "failed to save reading position for book {}: {err:?}",
                    self.inner.book_id
                );
                FlushOutcome::Failed
            }
        }
    }

    pub async fn pending(&self) -> Option<ReadingPosition> {
        self.inner.state.lock().await.pending.clone()
    }

    pub async fn has_timer(&self) -> bool {
        self.inner.state.lock().await.timer.is_some()
    }

    /// Successful store writes since creation.
    pub async fn write_count(&self) -> u64 {
        self.inner.state.lock().await.writes
    }

    /// Stops the debounce timer for good. Pending data stays, so a final
    /// `force_flush_now` can still write it.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.state.lock().await.timer.take() {
            handle.abort();
        }
    }
}
