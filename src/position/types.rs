use serde::{Deserialize, Serialize};

/// Where the reader is, independent of how the book is currently laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPosition {
    pub chapter_index: usize,
    /// Column page within the chapter; paginated mode only.
    pub page_index: Option<usize>,
    pub chapter_char_offset: usize,
    /// Derived from the chapter table, never used to locate anything.
    pub total_chars_read: usize,
    /// Snippet starting at the anchor, the fallback when offsets go stale.
    pub sentence_text: String,
    pub chapter_progress: f64,
    pub total_progress: f64,
    /// Capture time in unix milliseconds. Only used to let the newest of two
    /// competing store writes win.
    pub timestamp: i64,
}

impl ReadingPosition {
    /// Cheap fingerprint for write dedup. Collisions only ever skip a
    /// redundant write.
    pub fn signature(&self, prefix_chars: usize) -> PositionSignature {
        PositionSignature {
            chapter_index: self.chapter_index,
            chapter_char_offset: self.chapter_char_offset,
            prefix: self.sentence_text.chars().take(prefix_chars).collect(),
        }
    }

    pub fn has_sentence(&self) -> bool {
        !self.sentence_text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionSignature {
    pub chapter_index: usize,
    pub chapter_char_offset: usize,
    pub prefix: String,
}

/// Per-chapter character counts from the import pipeline.
///
/// Serialized as the bare list of chapter lengths; the total is always
/// recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct BookStats {
    chapter_lengths: Vec<usize>,
    total_length: usize,
}

impl BookStats {
    pub fn new(chapter_lengths: Vec<usize>) -> Self {
        let total_length = chapter_lengths.iter().sum();
        Self {
            chapter_lengths,
            total_length,
        }
    }

    pub fn chapter_lengths(&self) -> &[usize] {
        &self.chapter_lengths
    }

    pub fn chapter_length(&self, chapter_index: usize) -> Option<usize> {
        self.chapter_lengths.get(chapter_index).copied()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapter_lengths.len()
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }
}

impl From<Vec<usize>> for BookStats {
    fn from(chapter_lengths: Vec<usize>) -> Self {
        Self::new(chapter_lengths)
    }
}

impl From<BookStats> for Vec<usize> {
    fn from(stats: BookStats) -> Self {
        stats.chapter_lengths
    }
}
