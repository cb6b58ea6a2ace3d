//! Reading positions: the record itself, how it is sampled from a live
//! renderer, and how chapter-local progress rolls up to the whole book.

mod progress;
mod sampler;
mod types;

pub use progress::{aggregate, clamp_percent, BookProgress};
pub use sampler::{chapter_progress, sample};
pub use types::{BookStats, PositionSignature, ReadingPosition};
