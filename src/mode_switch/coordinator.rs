use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    time,
};

use crate::{
    db::PositionStore,
    engine::{EngineConfig, MountParams, ReaderEngine},
    position::{BookStats, ReadingPosition},
    renderer::{Layout, SharedRenderer},
    settings::SettingsStore,
};

use super::HandOff;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchPhase {
    #[default]
    Stable,
    Flushing,
    Remounting,
}

/// The UI side that actually creates and destroys renderer instances.
pub trait RendererHost: Send + Sync {
    /// Replace the reading surface with a neutral placeholder.
    fn show_placeholder(&self);

    fn unmount(&self, remount_key: u64);

    /// Mount a fresh renderer for `layout`. A new `remount_key` always means a
    /// new instance, never a reused one.
    fn mount(
        &self,
        layout: Layout,
        remount_key: u64,
        seed: Option<&ReadingPosition>,
    ) -> SharedRenderer;
}

/// Everything about the open book that outlives a single mount.
#[derive(Clone)]
pub struct BookContext {
    pub book_id: String,
    pub stats: Option<BookStats>,
    pub chapters_loaded: usize,
    pub store: Arc<dyn PositionStore>,
    pub config: EngineConfig,
}

struct Active {
    layout: Layout,
    remount_key: u64,
    engine: Option<ReaderEngine>,
}

/// Owns the single active engine for a book and swaps it out when the
/// reading mode or direction changes.
pub struct ModeSwitchCoordinator {
    context: BookContext,
    host: Arc<dyn RendererHost>,
    active: Mutex<Active>,
    phase_tx: watch::Sender<SwitchPhase>,
}

impl ModeSwitchCoordinator {
    pub async fn open(context: BookContext, host: Arc<dyn RendererHost>, layout: Layout) -> Self {
        let renderer = host.mount(layout, 0, None);
        let engine = ReaderEngine::mount(mount_params(&context, renderer, None)).await;

        log_info!(
            "opened book {} in {:?} {:?}",
            context.book_id,
            layout.mode,
            layout.direction
        );

        Self {
            context,
            host,
            active: Mutex::new(Active {
                layout,
                remount_key: 0,
                engine: Some(engine),
            }),
            phase_tx: watch::channel(SwitchPhase::Stable).0,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.context.book_id
    }

    /// The engine currently owning position capture. `None` once closed.
    pub async fn engine(&self) -> Option<ReaderEngine> {
        self.active.lock().await.engine.clone()
    }

    pub async fn layout(&self) -> Layout {
        self.active.lock().await.layout
    }

    pub async fn remount_key(&self) -> u64 {
        self.active.lock().await.remount_key
    }

    pub fn phase(&self) -> SwitchPhase {
        *self.phase_tx.borrow()
    }

    pub fn phase_watch(&self) -> watch::Receiver<SwitchPhase> {
        self.phase_tx.subscribe()
    }

    /// Switches to `layout`, carrying the reader's position across.
    ///
    /// Returns `false` when nothing changed or the book is already closed.
    /// Concurrent calls are serialized.
    pub async fn apply_layout(&self, layout: Layout) -> bool {
        let mut active = self.active.lock().await;
        if active.layout == layout {
            return false;
        }
        let Some(outgoing) = active.engine.take() else {
            return false;
        };

        self.phase_tx.send_replace(SwitchPhase::Flushing);
        self.host.show_placeholder();

        let outcome = outgoing.save_now().await;
        time::sleep(self.context.config.settle_delay()).await;
        let hand_off = outgoing.hand_off().await;
        outgoing.unmount().await;
        self.host.unmount(active.remount_key);

        log_debug!(
            "flushed {:?} before switching book {} (hand-off from {})",
            outcome,
            self.context.book_id,
            hand_off.mount_id
        );

        self.phase_tx.send_replace(SwitchPhase::Remounting);
        active.remount_key += 1;
        active.layout = layout;

        let renderer = self
            .host
            .mount(layout, active.remount_key, hand_off.position());
        let incoming =
            ReaderEngine::mount(mount_params(&self.context, renderer, Some(hand_off))).await;

        log_info!(
            "switched book {} to {:?} {:?} (remount {})",
            self.context.book_id,
            layout.mode,
            layout.direction,
            active.remount_key
        );

        active.engine = Some(incoming);
        self.phase_tx.send_replace(SwitchPhase::Stable);
        true
    }

    /// Applies whatever layout the settings file currently holds.
    pub async fn sync_with(&self, settings: &SettingsStore) -> bool {
        self.apply_layout(settings.layout()).await
    }

    /// Flushes and unmounts the active engine. Returns its final hand-off.
    pub async fn close(&self) -> Option<HandOff> {
        let mut active = self.active.lock().await;
        let engine = active.engine.take()?;
        let hand_off = engine.unmount().await;
        self.host.unmount(active.remount_key);
        log_info!("closed book {}", self.context.book_id);
        Some(hand_off)
    }
}

fn mount_params(
    context: &BookContext,
    renderer: SharedRenderer,
    seed: Option<HandOff>,
) -> MountParams {
    MountParams {
        book_id: context.book_id.clone(),
        renderer,
        store: Arc::clone(&context.store),
        config: context.config.clone(),
        stats: context.stats.clone(),
        chapters_loaded: context.chapters_loaded,
        seed,
    }
}
