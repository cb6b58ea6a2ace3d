use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::models::PersistedPosition;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Per-book position storage.
///
/// Writes are atomic per key and nothing more. `load` hands back the stored
/// blob untouched so that decoding, including legacy records, stays with the
/// caller.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn load(&self, book_id: &str) -> Result<Option<Value>>;

    /// Upserts the record. A record older than the stored one (by
    /// `last_read`) is dropped so the most recent write wins.
    async fn save(&self, book_id: &str, record: &PersistedPosition) -> Result<()>;

    /// Called when a book leaves the library.
    async fn delete(&self, book_id: &str) -> Result<()>;
}

struct MemoryEntry {
    last_read: i64,
    value: Value,
}

/// Process-local store for tests and books opened without a library.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw blob, bypassing encoding. Useful for legacy records.
    pub async fn insert_raw(&self, book_id: &str, value: Value) {
        self.entries.lock().await.insert(
            book_id.to_string(),
            MemoryEntry {
                last_read: i64::MIN,
                value,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn load(&self, book_id: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .lock()
            .await
            .get(book_id)
            .map(|entry| entry.value.clone()))
    }

    async fn save(&self, book_id: &str, record: &PersistedPosition) -> Result<()> {
        let value = record.to_value()?;
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(book_id) {
            if existing.last_read > record.last_read {
                log_debug!("dropping stale position write for book {book_id}");
                return Ok(());
            }
        }
        entries.insert(
            book_id.to_string(),
            MemoryEntry {
                last_read: record.last_read,
                value,
            },
        );
        Ok(())
    }

    async fn delete(&self, book_id: &str) -> Result<()> {
        self.entries.lock().await.remove(book_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ReadingPosition;

    fn record(offset: usize, last_read: i64) -> PersistedPosition {
        PersistedPosition::from_position(&ReadingPosition {
            chapter_index: 0,
            page_index: None,
            chapter_char_offset: offset,
            total_chars_read: offset,
            sentence_text: "snippet".into(),
            chapter_progress: 0.0,
            total_progress: 0.0,
            timestamp: last_read,
        })
    }

    #[tokio::test]
    async fn newest_write_wins() {
        let store = MemoryStore::new();
        store.save("book", &record(10, 200)).await.unwrap();
        store.save("book", &record(5, 100)).await.unwrap();

        let loaded = store.load("book").await.unwrap().unwrap();
        assert_eq!(loaded["chapterCharOffset"], 10);

        store.save("book", &record(20, 200)).await.unwrap();
        let loaded = store.load("book").await.unwrap().unwrap();
        assert_eq!(loaded["chapterCharOffset"], 20);
    }

    #[tokio::test]
    async fn delete_means_never_read() {
        let store = MemoryStore::new();
        store.save("book", &record(10, 1)).await.unwrap();
        store.delete("book").await.unwrap();
        assert!(store.load("book").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
