use std::sync::Arc;

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    db::{PersistedPosition, PositionStore},
    mode_switch::HandOff,
    persistence::{FlushOutcome, PersistenceScheduler},
    position::{sample, BookStats, ReadingPosition},
    renderer::{ReadingMode, SharedRenderer},
    restoration::{resolve_once, RestoreState},
};

use super::{EngineConfig, EngineState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Everything a new mount needs.
pub struct MountParams {
    pub book_id: String,
    pub renderer: SharedRenderer,
    pub store: Arc<dyn PositionStore>,
    pub config: EngineConfig,
    pub stats: Option<BookStats>,
    pub chapters_loaded: usize,
    /// Position handed over by the previous mount. When present the store is
    /// not consulted.
    pub seed: Option<HandOff>,
}

/// Position engine bound to one mounted renderer.
///
/// The UI reports viewport movement; the engine samples, persists on a
/// debounce, and on mount walks the reader back to where they left off.
/// Clones share the same mount.
#[derive(Clone)]
pub struct ReaderEngine {
    mount_id: Uuid,
    book_id: Arc<str>,
    renderer: SharedRenderer,
    config: Arc<EngineConfig>,
    state: Arc<Mutex<EngineState>>,
    scheduler: PersistenceScheduler,
    cancel: CancellationToken,
    restore_cancel: CancellationToken,
    restore_task: Arc<Mutex<Option<JoinHandle<RestoreState>>>>,
    ready_tx: Arc<watch::Sender<bool>>,
    progress_tx: Arc<watch::Sender<f64>>,
    restored_tx: Arc<watch::Sender<bool>>,
}

impl ReaderEngine {
    pub async fn mount(params: MountParams) -> Self {
        let MountParams {
            book_id,
            renderer,
            store,
            config,
            stats,
            chapters_loaded,
            seed,
        } = params;

        let mode = renderer.lock().await.layout().mode;
        let saved = match seed {
            Some(hand_off) => hand_off.into_position(),
            None => load_saved(store.as_ref(), &book_id).await,
        };

        let mut state = EngineState::new(mode, saved);
        state.stats = stats.map(Arc::new);
        state.chapters_loaded = chapters_loaded;
        discard_out_of_range_saved(&mut state, &book_id);

        let initial_progress = state
            .saved
            .as_ref()
            .map(|p| p.total_progress)
            .unwrap_or(0.0);
        let restoration_done = state.restore.is_terminal();

        let scheduler = PersistenceScheduler::new(
            book_id.clone(),
            store,
            config.save_debounce(),
            config.signature_chars,
        );

        let cancel = CancellationToken::new();
        let engine = Self {
            mount_id: Uuid::new_v4(),
            book_id: Arc::from(book_id),
            renderer,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(state)),
            scheduler,
            restore_cancel: cancel.child_token(),
            cancel,
            restore_task: Arc::new(Mutex::new(None)),
            ready_tx: Arc::new(watch::channel(false).0),
            progress_tx: Arc::new(watch::channel(initial_progress).0),
            restored_tx: Arc::new(watch::channel(restoration_done).0),
        };

        log_info!(
            "mounted {:?} reader {} for book {}",
            mode,
            engine.mount_id,
            engine.book_id
        );

        engine.refresh_readiness().await;
        engine
    }

    pub fn mount_id(&self) -> Uuid {
        self.mount_id
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &PersistenceScheduler {
        &self.scheduler
    }

    pub fn is_mounted(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Whole-book progress, 0–100.
    pub fn current_progress(&self) -> f64 {
        *self.progress_tx.borrow()
    }

    pub fn ready_watch(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    pub fn progress_watch(&self) -> watch::Receiver<f64> {
        self.progress_tx.subscribe()
    }

    /// Flips to `true` once restoration has succeeded, given up, or had
    /// nothing to do.
    pub fn restoration_watch(&self) -> watch::Receiver<bool> {
        self.restored_tx.subscribe()
    }

    pub async fn restore_state(&self) -> RestoreState {
        self.state.lock().await.restore
    }

    pub async fn saved_position(&self) -> Option<ReadingPosition> {
        self.state.lock().await.saved.clone()
    }

    pub async fn last_known(&self) -> Option<ReadingPosition> {
        self.state.lock().await.last_known.clone()
    }

    pub async fn chapter_index(&self) -> usize {
        self.state.lock().await.chapter_index
    }

    pub async fn set_book_stats(&self, stats: BookStats) {
        {
            let mut state = self.state.lock().await;
            state.stats = Some(Arc::new(stats));
            discard_out_of_range_saved(&mut state, &self.book_id);
        }
        self.refresh_readiness().await;
    }

    pub async fn set_chapters_loaded(&self, count: usize) {
        self.state.lock().await.chapters_loaded = count;
        self.refresh_readiness().await;
    }

    /// The viewport moved.
    pub async fn report_scroll(&self) {
        if let Some(position) = self.sample_current().await {
            self.scheduler.schedule(position).await;
        }
    }

    /// The reader crossed into another chapter. The previous position is
    /// written immediately rather than waiting out the debounce.
    pub async fn report_chapter_change(&self, chapter_index: usize, page: Option<usize>) {
        if !self.is_mounted() {
            return;
        }

        let (previous, interrupts_restore) = {
            let state = self.state.lock().await;
            if !state.chapter_in_range(chapter_index) {
                log_warn!(
                    "ignoring chapter change to {chapter_index} for book {}: out of range",
                    self.book_id
                );
                return;
            }
            let interrupts_restore = !state.restore.is_terminal()
                && !state
                    .saved
                    .as_ref()
                    .is_some_and(|saved| saved.chapter_index == chapter_index);
            let previous = if state.can_sample() {
                state.last_known.clone()
            } else {
                None
            };
            (previous, interrupts_restore)
        };

        // The reader navigated away on their own; a late retry must not pull
        // them back to the saved chapter.
        if interrupts_restore {
            let settled = self.abandon_restoration().await;
            log_debug!(
                "chapter change to {chapter_index} for book {} ended restoration as {:?}",
                self.book_id,
                settled
            );
        }

        if let Some(previous) = previous {
            self.scheduler.schedule(previous).await;
        }
        self.scheduler.force_flush_now().await;

        {
            let mut state = self.state.lock().await;
            state.chapter_index = chapter_index;
            state.page_index = page;
            if state.mode == ReadingMode::Paginated {
                state.pagination_ready = false;
            }
        }
        self.refresh_readiness().await;

        if let Some(position) = self.sample_current().await {
            self.scheduler.schedule(position).await;
        }
    }

    /// Paginated-mode page turn. `total_pages` marks pagination as computed
    /// for the current chapter.
    pub async fn report_page_change(&self, page: usize, total_pages: Option<usize>) {
        if !self.is_mounted() {
            return;
        }

        {
            let mut state = self.state.lock().await;
            state.page_index = Some(page);
            if total_pages.is_some_and(|total| total > 0) {
                state.pagination_ready = true;
            }
        }
        self.refresh_readiness().await;

        if let Some(position) = self.sample_current().await {
            self.scheduler.schedule(position).await;
        }
    }

    /// Samples (when allowed) and writes through immediately. Used on tab
    /// hide, unload, and before a mode switch.
    pub async fn save_now(&self) -> FlushOutcome {
        if let Some(position) = self.sample_current().await {
            self.scheduler.schedule(position).await;
        }
        self.scheduler.force_flush_now().await
    }

    /// One pass of the restoration chain.
    ///
    /// Returns `true` once the saved anchor has been reached; later calls on
    /// the same mount return `true` without moving the renderer again. After
    /// restoration has been given up it returns `false` without running.
    pub async fn restore_position(&self) -> bool {
        self.attempt_restore().await
    }

    /// Waits until restoration reaches a terminal state. Only returns once
    /// the engine has become ready at least once.
    pub async fn wait_for_restoration(&self) -> RestoreState {
        let mut done = self.restored_tx.subscribe();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                break;
            }
        }
        self.restore_state().await
    }

    /// The in-memory hand-off slot: the freshest position this mount knows,
    /// falling back to the one it was asked to restore.
    pub async fn hand_off(&self) -> HandOff {
        let state = self.state.lock().await;
        let position = state.last_known.clone().or_else(|| state.saved.clone());
        HandOff::new(self.mount_id, position)
    }

    /// Flushes, then stops every timer and retry owned by this mount.
    pub async fn unmount(&self) -> HandOff {
        let outcome = self.scheduler.force_flush_now().await;
        self.cancel.cancel();
        self.scheduler.shutdown().await;

        self.abandon_restoration().await;
        self.ready_tx.send_replace(false);

        log_info!(
            "unmounted reader {} for book {} (final flush: {:?})",
            self.mount_id,
            self.book_id,
            outcome
        );
        self.hand_off().await
    }

    async fn refresh_readiness(&self) {
        let (ready, needs_restore, settled) = {
            let state = self.state.lock().await;
            let ready = state.is_ready() && self.is_mounted();
            (
                ready,
                ready && state.restore == RestoreState::Idle,
                state.restore.is_terminal(),
            )
        };

        self.ready_tx.send_if_modified(|current| {
            if *current == ready {
                false
            } else {
                *current = ready;
                true
            }
        });

        // Stats arriving late can settle restoration without a pass running.
        if settled {
            self.restored_tx.send_if_modified(|done| !std::mem::replace(done, true));
        }

        if needs_restore {
            self.spawn_restoration().await;
        }
    }

    /// Stops the retry task and settles restoration as `Cancelled` unless it
    /// already reached a terminal state.
    async fn abandon_restoration(&self) -> RestoreState {
        self.restore_cancel.cancel();
        if let Some(handle) = self.restore_task.lock().await.take() {
            handle.abort();
        }
        self.finish_restoration(RestoreState::Cancelled).await
    }

    async fn spawn_restoration(&self) {
        {
            let mut state = self.state.lock().await;
            if state.restore != RestoreState::Idle {
                return;
            }
            state.restore = RestoreState::Attempting(1);
        }

        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.run_restoration().await });
        *self.restore_task.lock().await = Some(handle);
    }

    /// Bounded retry loop: linear backoff between passes, then give up and
    /// report completion anyway so the UI never waits forever.
    async fn run_restoration(&self) -> RestoreState {
        let max_attempts = self.config.restore_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if self.restore_cancel.is_cancelled() {
                return self.finish_restoration(RestoreState::Cancelled).await;
            }
            {
                let mut state = self.state.lock().await;
                if state.restore.is_terminal() {
                    return state.restore;
                }
                state.restore = RestoreState::Attempting(attempt);
            }

            if self.attempt_restore().await {
                return RestoreState::Restored;
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = time::sleep(self.config.restore_backoff(attempt)) => {}
                    _ = self.restore_cancel.cancelled() => {
                        return self.finish_restoration(RestoreState::Cancelled).await;
                    }
                }
            }
        }

        log_warn!(
            "restoration for book {} gave up after {} attempts; leaving reader at degraded anchor",
            self.book_id,
            max_attempts
        );
        self.finish_restoration(RestoreState::Degraded).await
    }

    async fn finish_restoration(&self, outcome: RestoreState) -> RestoreState {
        let settled = {
            let mut state = self.state.lock().await;
            if !state.restore.is_terminal() {
                state.restore = outcome;
            }
            state.restore
        };
        self.restored_tx.send_replace(true);
        settled
    }

    async fn attempt_restore(&self) -> bool {
        let saved = {
            let state = self.state.lock().await;
            match state.restore {
                RestoreState::Restored => return true,
                RestoreState::Degraded | RestoreState::Skipped | RestoreState::Cancelled => {
                    return false
                }
                RestoreState::Idle | RestoreState::Attempting(_) => {}
            }
            if !state.is_ready() {
                return false;
            }
            match &state.saved {
                Some(saved) => saved.clone(),
                None => return false,
            }
        };

        if self.restore_cancel.is_cancelled() {
            return false;
        }

        let step = {
            let mut renderer = self.renderer.lock().await;
            if self.restore_cancel.is_cancelled() {
                return false;
            }
            resolve_once(&mut *renderer, &saved, &self.config)
        };

        if !step.is_exact() {
            log_debug!(
                "restoration pass for book {} landed on {:?}",
                self.book_id,
                step
            );
            return false;
        }

        {
            let mut state = self.state.lock().await;
            if state.restore.is_terminal() {
                return state.restore == RestoreState::Restored;
            }
            state.restore = RestoreState::Restored;
            state.chapter_index = saved.chapter_index;
            state.last_known = Some(saved.clone());
        }
        self.progress_tx.send_replace(saved.total_progress);
        self.restored_tx.send_replace(true);

        log_info!(
            "restored book {} to chapter {} offset {} via {:?}",
            self.book_id,
            saved.chapter_index,
            saved.chapter_char_offset,
            step
        );
        true
    }

    async fn sample_current(&self) -> Option<ReadingPosition> {
        if !self.is_mounted() {
            return None;
        }

        let (chapter_index, stats) = {
            let state = self.state.lock().await;
            if !state.can_sample() {
                return None;
            }
            (state.chapter_index, state.stats.clone()?)
        };

        let position = {
            let renderer = self.renderer.lock().await;
            sample(&*renderer, chapter_index, &stats, &self.config)
        }?;

        self.state.lock().await.last_known = Some(position.clone());
        self.progress_tx.send_replace(position.total_progress);
        Some(position)
    }
}

async fn load_saved(store: &dyn PositionStore, book_id: &str) -> Option<ReadingPosition> {
    match store.load(book_id).await {
        Ok(Some(value)) => match PersistedPosition::decode(value) {
            Ok(record) => Some(record.into_position()),
            Err(err) => {
                log_warn!("ignoring unreadable saved position for book {book_id}: {err:#}");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            log_warn!("could not load saved position for book {book_id}: {err:#}");
            None
        }
    }
}

fn discard_out_of_range_saved(state: &mut EngineState, book_id: &str) {
    let out_of_range = state
        .saved
        .as_ref()
        .is_some_and(|saved| !state.chapter_in_range(saved.chapter_index));
    if !out_of_range || state.restore.is_terminal() {
        return;
    }

    log_warn!("saved chapter for book {book_id} no longer exists; starting from the beginning");
    state.saved = None;
    state.restore = RestoreState::Skipped;
    state.chapter_index = 0;
    state.page_index = None;
}
