use chrono::Utc;

use crate::addressing::{chapter_len, offset_of, text_window};
use crate::engine::EngineConfig;
use crate::renderer::{probe_point, ReadingMode, Renderer};

use super::progress::{aggregate, clamp_percent};
use super::types::{BookStats, ReadingPosition};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Chapter-local progress: page ratio when the chapter spans several
/// columns, scroll ratio otherwise.
pub fn chapter_progress(renderer: &dyn Renderer) -> f64 {
    if renderer.layout().mode == ReadingMode::Paginated {
        if let Some(metrics) = renderer.page_metrics() {
            if metrics.total_pages > 1 {
                let page = (metrics.page_index + 1) as f64;
                return clamp_percent(page / metrics.total_pages as f64 * 100.0);
            }
        }
    }
    clamp_percent(renderer.chapter_progress_percent())
}

/// Captures the reader's current position from the mounted renderer.
///
/// Returns `None` when there is no focal text and progress is exactly zero:
/// right after a chapter switch the layout has not settled, and persisting
/// that state would clobber a good saved position.
pub fn sample(
    renderer: &dyn Renderer,
    chapter_index: usize,
    stats: &BookStats,
    config: &EngineConfig,
) -> Option<ReadingPosition> {
    let layout = renderer.layout();
    let chapter_progress = chapter_progress(renderer);
    let page_index = match layout.mode {
        ReadingMode::Paginated => renderer.page_metrics().map(|m| m.page_index),
        ReadingMode::Continuous => None,
    };

    let probe = probe_point(layout.direction, renderer.viewport(), config.probe_inset_px);
    let document = renderer.chapter_root(chapter_index);
    let anchor = renderer
        .focal_anchor(probe)
        .filter(|anchor| anchor.chapter_index == chapter_index);

    let focal = match (&document, anchor) {
        (Some(doc), Some(anchor)) => offset_of(doc, anchor.point.node, anchor.point.offset)
            .map(|offset| (offset, text_window(doc, offset, config.snippet_chars))),
        _ => None,
    };

    let (chapter_char_offset, sentence_text) = match focal {
        Some(found) => found,
        None if chapter_progress == 0.0 => {
            log_debug!("no focal text in chapter {chapter_index} at progress 0; skipping sample");
            return None;
        }
        None => {
            let len = document
                .as_deref()
                .map(chapter_len)
                .or_else(|| stats.chapter_length(chapter_index))
                .unwrap_or(0);
            let estimate = (len as f64 * chapter_progress / 100.0).floor() as usize;
            log_debug!(
                "no focal text in chapter {chapter_index}; estimating offset {estimate} from {chapter_progress:.1}%"
            );
            (estimate, String::new())
        }
    };

    let book = aggregate(chapter_index, chapter_progress, stats);

    Some(ReadingPosition {
        chapter_index,
        page_index,
        chapter_char_offset,
        total_chars_read: book.total_chars_read,
        sentence_text,
        chapter_progress,
        total_progress: book.total_progress,
        timestamp: Utc::now().timestamp_millis(),
    })
}
