//! What the engine needs from whichever renderer is mounted.
//!
//! Both the continuous-scroll and the paginated-column renderer live outside
//! this crate. They lay chapters out, answer "what text is under this point",
//! and move the viewport when asked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::addressing::{ChapterDocument, TextPoint};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReadingMode {
    #[default]
    Continuous,
    Paginated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WritingDirection {
    #[default]
    HorizontalTb,
    /// Vertical lines, progressing right to left.
    VerticalRl,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub mode: ReadingMode,
    pub direction: WritingDirection,
}

impl Layout {
    pub fn new(mode: ReadingMode, direction: WritingDirection) -> Self {
        Self { mode, direction }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Viewport-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetrics {
    pub page_index: usize,
    pub total_pages: usize,
}

/// A text point together with the chapter it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub chapter_index: usize,
    pub point: TextPoint,
}

pub trait Renderer: Send {
    fn layout(&self) -> Layout;

    fn viewport(&self) -> Viewport;

    /// Text under `probe`, if any is laid out there.
    fn focal_anchor(&self, probe: ProbePoint) -> Option<Anchor>;

    fn chapter_root(&self, chapter_index: usize) -> Option<Arc<ChapterDocument>>;

    /// Scroll ratio through the current chapter, 0–100.
    fn chapter_progress_percent(&self) -> f64;

    /// Page position in paginated mode; `None` until pagination is computed
    /// and always `None` for continuous scroll.
    fn page_metrics(&self) -> Option<PageMetrics>;

    fn scroll_to_anchor(&mut self, chapter_index: usize, point: TextPoint) -> bool;

    fn scroll_to_chapter_boundary(&mut self, chapter_index: usize);
}

pub type SharedRenderer = Arc<Mutex<dyn Renderer>>;

/// Probe location near the leading corner of the viewport. Horizontal text
/// starts top-left; vertical right-to-left text starts top-right.
pub fn probe_point(direction: WritingDirection, viewport: Viewport, inset: f64) -> ProbePoint {
    let inset_x = inset.min(viewport.width.max(0.0));
    let inset_y = inset.min(viewport.height.max(0.0));
    match direction {
        WritingDirection::HorizontalTb => ProbePoint {
            x: inset_x,
            y: inset_y,
        },
        WritingDirection::VerticalRl => ProbePoint {
            x: (viewport.width - inset_x).max(0.0),
            y: inset_y,
        },
    }
}
