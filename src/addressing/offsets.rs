use super::document::{ChapterDocument, NodeId, TextPoint};
use super::walker::TextWalker;

/// Character offset of `point_offset` inside `node`, measured from the start
/// of the chapter's furigana-stable stream.
///
/// Returns `None` when `node` is not part of the stream (gloss text, an
/// element, or a handle from another document). Offsets past the end of the
/// node clamp to its length.
pub fn offset_of(doc: &ChapterDocument, node: NodeId, point_offset: usize) -> Option<usize> {
    let mut accumulated = 0usize;
    for (id, text) in TextWalker::new(doc) {
        let len = text.chars().count();
        if id == node {
            return Some(accumulated + point_offset.min(len));
        }
        accumulated += len;
    }
    None
}

/// Inverse of [`offset_of`]: the text point holding stream character
/// `target`.
///
/// Offset 0 always resolves to the first text unit, even an empty one.
/// Targets at or past the end of the stream return `None`.
pub fn point_at_offset(doc: &ChapterDocument, target: usize) -> Option<TextPoint> {
    let mut walker = TextWalker::new(doc);
    let (first, first_text) = walker.next()?;
    if target == 0 {
        return Some(TextPoint::new(first, 0));
    }

    let mut accumulated = first_text.chars().count();
    if accumulated > target {
        return Some(TextPoint::new(first, target));
    }

    for (id, text) in walker {
        let len = text.chars().count();
        if accumulated + len > target {
            return Some(TextPoint::new(id, target - accumulated));
        }
        accumulated += len;
    }
    None
}

pub fn chapter_len(doc: &ChapterDocument) -> usize {
    TextWalker::new(doc)
        .map(|(_, text)| text.chars().count())
        .sum()
}

/// Concatenated furigana-stable text of the chapter.
pub fn stream_text(doc: &ChapterDocument) -> String {
    TextWalker::new(doc).map(|(_, text)| text).collect()
}

/// Up to `max_chars` characters of the stream starting at `offset`. When the
/// offset sits at the very end of the chapter the window ends there instead.
pub fn text_window(doc: &ChapterDocument, offset: usize, max_chars: usize) -> String {
    let stream = stream_text(doc);
    let forward: String = stream.chars().skip(offset).take(max_chars).collect();
    if !forward.is_empty() {
        return forward;
    }
    let total = stream.chars().count();
    stream
        .chars()
        .skip(total.saturating_sub(max_chars))
        .collect()
}

/// Stream offset of the first occurrence of `needle`. Matches may span text
/// node boundaries, since inline markup splits sentences arbitrarily.
pub fn find_text(doc: &ChapterDocument, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let stream = stream_text(doc);
    let byte_index = stream.find(needle)?;
    Some(stream[..byte_index].chars().count())
}
