//! Persisted reading position record.
//!
//! Stored as one JSON blob per book. Older readers wrote the same fields
//! without a `schemaVersion`; those records are read as version 0 and
//! migrated on load.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::position::{clamp_percent, ReadingPosition};

pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPosition {
    pub schema_version: u32,
    pub chapter_index: usize,
    /// Zero-based column page, paginated mode only.
    pub page_number: Option<usize>,
    pub chapter_char_offset: usize,
    pub total_chars_read: usize,
    pub sentence_text: String,
    pub chapter_progress: f64,
    pub total_progress: f64,
    /// Unix milliseconds.
    pub last_read: i64,
}

/// Every field optional and numbers read as `f64`, so that hand-edited or
/// legacy records with `120.0` where `120` is expected still load.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRecord {
    schema_version: Option<u32>,
    chapter_index: Option<f64>,
    page_number: Option<f64>,
    chapter_char_offset: Option<f64>,
    total_chars_read: Option<f64>,
    sentence_text: Option<String>,
    chapter_progress: Option<f64>,
    total_progress: Option<f64>,
    last_read: Option<f64>,
}

fn as_count(value: Option<f64>) -> Option<usize> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Some(v.floor() as usize),
        _ => None,
    }
}

impl PersistedPosition {
    pub fn from_position(position: &ReadingPosition) -> Self {
        Self {
            schema_version: RECORD_VERSION,
            chapter_index: position.chapter_index,
            page_number: position.page_index,
            chapter_char_offset: position.chapter_char_offset,
            total_chars_read: position.total_chars_read,
            sentence_text: position.sentence_text.clone(),
            chapter_progress: position.chapter_progress,
            total_progress: position.total_progress,
            last_read: position.timestamp,
        }
    }

    pub fn into_position(self) -> ReadingPosition {
        ReadingPosition {
            chapter_index: self.chapter_index,
            page_index: self.page_number,
            chapter_char_offset: self.chapter_char_offset,
            total_chars_read: self.total_chars_read,
            sentence_text: self.sentence_text,
            chapter_progress: self.chapter_progress,
            total_progress: self.total_progress,
            timestamp: self.last_read,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).context("failed to serialize position record")
    }

    /// Decodes a stored blob of any known version into the current shape.
    ///
    /// Fails on records that cannot be trusted: not an object, no chapter
    /// index, or written by a newer schema. Callers treat a failure the same
    /// as "never read".
    pub fn decode(value: Value) -> Result<Self> {
        if !value.is_object() {
            bail!("position record is not an object");
        }

        let raw: RawRecord =
            serde_json::from_value(value).context("position record has malformed fields")?;

        let version = raw.schema_version.unwrap_or(0);
        if version > RECORD_VERSION {
            bail!(
                "position record version ({}) is newer than supported ({})",
                version,
                RECORD_VERSION
            );
        }

        let Some(chapter_index) = as_count(raw.chapter_index) else {
            bail!("position record has no usable chapterIndex");
        };

        Ok(Self {
            schema_version: RECORD_VERSION,
            chapter_index,
            page_number: as_count(raw.page_number),
            chapter_char_offset: as_count(raw.chapter_char_offset).unwrap_or(0),
            total_chars_read: as_count(raw.total_chars_read).unwrap_or(0),
            sentence_text: raw.sentence_text.unwrap_or_default(),
            chapter_progress: clamp_percent(raw.chapter_progress.unwrap_or(0.0)),
            total_progress: clamp_percent(raw.total_progress.unwrap_or(0.0)),
            last_read: raw
                .last_read
                .filter(|v| v.is_finite())
                .map(|v| v as i64)
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn position() -> ReadingPosition {
        ReadingPosition {
            chapter_index: 3,
            page_index: Some(2),
            chapter_char_offset: 120,
            total_chars_read: 3120,
            sentence_text: "彼は静かに扉を開けた。".into(),
            chapter_progress: 12.5,
            total_progress: 31.2,
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn current_records_decode_unchanged() {
        let record = PersistedPosition::from_position(&position());
        let decoded = PersistedPosition::decode(record.to_value().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.into_position(), position());
    }

    #[test]
    fn wire_shape_uses_camel_case_names() {
        let value = PersistedPosition::from_position(&position()).to_value().unwrap();
        assert_eq!(value["schemaVersion"], json!(1));
        assert_eq!(value["pageNumber"], json!(2));
        assert_eq!(value["chapterCharOffset"], json!(120));
        assert_eq!(value["lastRead"], json!(1_700_000_000_000i64));
    }

    #[test]
    fn legacy_records_get_defaults() {
        let legacy = json!({
            "chapterIndex": 4,
            "pageNumber": null,
            "sentenceText": "Call me Ishmael.",
            "chapterProgress": 130.0,
            "lastRead": 1690000000000.0
        });

        let decoded = PersistedPosition::decode(legacy).unwrap();
        assert_eq!(decoded.schema_version, RECORD_VERSION);
        assert_eq!(decoded.chapter_index, 4);
        assert_eq!(decoded.page_number, None);
        assert_eq!(decoded.chapter_char_offset, 0);
        assert_eq!(decoded.chapter_progress, 100.0);
        assert_eq!(decoded.last_read, 1_690_000_000_000);
    }

    #[test]
    fn float_encoded_counts_are_accepted() {
        let decoded =
            PersistedPosition::decode(json!({"chapterIndex": 2.0, "chapterCharOffset": 57.0}))
                .unwrap();
        assert_eq!(decoded.chapter_index, 2);
        assert_eq!(decoded.chapter_char_offset, 57);
    }

    #[test]
    fn untrustworthy_records_are_rejected() {
        assert!(PersistedPosition::decode(json!("chapter 3")).is_err());
        assert!(PersistedPosition::decode(json!({"sentenceText": "orphan"})).is_err());
        assert!(PersistedPosition::decode(json!({"chapterIndex": -1})).is_err());
        assert!(PersistedPosition::decode(json!({"chapterIndex": "two"})).is_err());
        assert!(
            PersistedPosition::decode(json!({"schemaVersion": 9, "chapterIndex": 1})).is_err()
        );
    }
}
