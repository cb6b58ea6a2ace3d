//! Character addressing over chapter documents.
//!
//! An address is a zero-based character offset into the chapter's
//! furigana-stable text stream: all text in document order, minus anything
//! under `<rt>`/`<rp>`. Hiding or showing furigana never moves an address.

mod document;
mod offsets;
mod walker;

pub use document::{ChapterDocument, NodeId, NodeKind, TextPoint};
pub use offsets::{chapter_len, find_text, offset_of, point_at_offset, stream_text, text_window};
pub use walker::{is_gloss_tag, TextWalker, GLOSS_TAGS};
