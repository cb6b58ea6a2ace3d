use crate::addressing::{find_text, point_at_offset};
use crate::engine::EngineConfig;
use crate::position::ReadingPosition;
use crate::renderer::Renderer;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Which rung of the fallback chain a single resolution pass landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStep {
    /// The saved character offset still maps to text.
    CharOffset,
    /// The offset was stale, but the snippet was found in the chapter.
    SentenceMatch,
    /// Only the chapter start could be reached. Degraded.
    ChapterBoundary,
    /// The chapter is not laid out yet.
    NotFound,
}

impl ResolveStep {
    pub fn is_exact(self) -> bool {
        matches!(self, Self::CharOffset | Self::SentenceMatch)
    }
}

/// One pass of the fallback chain against the mounted renderer.
///
/// 1. saved offset (when non-zero) → text point;
/// 2. leading snippet characters → first match in the chapter stream;
/// 3. chapter start, when the chapter element exists.
pub fn resolve_once(
    renderer: &mut dyn Renderer,
    saved: &ReadingPosition,
    config: &EngineConfig,
) -> ResolveStep {
    let chapter = saved.chapter_index;
    let Some(doc) = renderer.chapter_root(chapter) else {
        log_debug!("chapter {chapter} not laid out yet");
        return ResolveStep::NotFound;
    };

    if saved.chapter_char_offset > 0 {
        match point_at_offset(&doc, saved.chapter_char_offset) {
            Some(point) if renderer.scroll_to_anchor(chapter, point) => {
                return ResolveStep::CharOffset;
            }
            Some(_) => {
                log_debug!("renderer refused anchor for offset {}", saved.chapter_char_offset);
            }
            None => {
                log_debug!(
                    "offset {} no longer maps into chapter {chapter}",
                    saved.chapter_char_offset
                );
            }
        }
    }

    let prefix: String = saved
        .sentence_text
        .trim_start()
        .chars()
        .take(config.search_prefix_chars)
        .collect();
    if !prefix.trim().is_empty() {
        if let Some(point) = find_text(&doc, &prefix).and_then(|at| point_at_offset(&doc, at)) {
            if renderer.scroll_to_anchor(chapter, point) {
                return ResolveStep::SentenceMatch;
            }
        }
        log_debug!("snippet not found in chapter {chapter}");
    }

    renderer.scroll_to_chapter_boundary(chapter);
    ResolveStep::ChapterBoundary
}
