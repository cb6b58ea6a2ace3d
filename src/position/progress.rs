use super::types::BookStats;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BookProgress {
    pub total_chars_read: usize,
    pub total_progress: f64,
}

/// Whole-book progress from a chapter-local percentage.
///
/// Pure and deterministic: identical inputs always give identical output,
/// which the write dedup relies on.
pub fn aggregate(chapter_index: usize, chapter_progress: f64, stats: &BookStats) -> BookProgress {
    if stats.total_length() == 0 {
        return BookProgress::default();
    }

    let percent = clamp_percent(chapter_progress);
    let before: usize = stats.chapter_lengths().iter().take(chapter_index).sum();
    let current = stats.chapter_length(chapter_index).unwrap_or(0);
    let within = (current as f64 * percent / 100.0).floor() as usize;

    let total_chars_read = before + within;
    let total_progress =
        clamp_percent(total_chars_read as f64 / stats.total_length() as f64 * 100.0);

    BookProgress {
        total_chars_read,
        total_progress,
    }
}

/// Clamps to [0, 100]; NaN counts as the start.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
