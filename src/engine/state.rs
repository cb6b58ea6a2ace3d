use std::sync::Arc;

use crate::{
    position::{BookStats, ReadingPosition},
    renderer::ReadingMode,
    restoration::RestoreState,
};

/// Mutable state of one engine mount.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub mode: ReadingMode,
    pub stats: Option<Arc<BookStats>>,
    pub chapters_loaded: usize,
    pub chapter_index: usize,
    pub page_index: Option<usize>,
    /// Page count known for the current chapter. Paginated mode only.
    pub pagination_ready: bool,
    /// Position this mount should return the reader to.
    pub saved: Option<ReadingPosition>,
    pub restore: RestoreState,
    /// Last position sampled (or restored) by this mount: the hand-off slot.
    pub last_known: Option<ReadingPosition>,
}

impl EngineState {
    pub fn new(mode: ReadingMode, saved: Option<ReadingPosition>) -> Self {
        let restore = if saved.is_some() {
            RestoreState::Idle
        } else {
            RestoreState::Skipped
        };
        Self {
            mode,
            stats: None,
            chapters_loaded: 0,
            chapter_index: saved.as_ref().map(|p| p.chapter_index).unwrap_or(0),
            page_index: saved.as_ref().and_then(|p| p.page_index),
            pagination_ready: false,
            saved,
            restore,
            last_known: None,
        }
    }

    /// Stats and at least one chapter are known, and in paginated mode the
    /// current chapter has been paginated.
    pub fn is_ready(&self) -> bool {
        let content_ready = self.stats.is_some() && self.chapters_loaded > 0;
        match self.mode {
            ReadingMode::Continuous => content_ready,
            ReadingMode::Paginated => content_ready && self.pagination_ready,
        }
    }

    pub fn can_sample(&self) -> bool {
        self.is_ready() && !self.restore.blocks_sampling()
    }

    pub fn chapter_in_range(&self, chapter_index: usize) -> bool {
        match &self.stats {
            Some(stats) => chapter_index < stats.chapter_count(),
            None => true,
        }
    }
}
