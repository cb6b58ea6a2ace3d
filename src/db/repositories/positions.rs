use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::db::{
    helpers::{parse_datetime, to_i64},
    models::PersistedPosition,
    Database, PositionStore,
};

/// Library-view row: which book, how far, and when it was last opened.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSummary {
    pub book_id: String,
    pub last_read: i64,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Raw stored blob for a book. Unparseable JSON is an error; the engine
    /// treats it like a missing record.
    pub async fn load_position(&self, book_id: &str) -> Result<Option<Value>> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT record FROM reading_positions WHERE book_id = ?1",
                    params![book_id],
                    |row| row.get(0),
                )
                .optional()?;

            raw.map(|text| {
                serde_json::from_str(&text)
                    .with_context(|| format!("corrupt position record for book {book_id}"))
            })
            .transpose()
        })
        .await
    }

    pub async fn save_position(&self, book_id: &str, record: &PersistedPosition) -> Result<()> {
        let book_id = book_id.to_string();
        let body = serde_json::to_string(record).context("failed to serialize position")?;
        let last_read = record.last_read;
        let updated_at = Utc::now().to_rfc3339();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO reading_positions (book_id, record, last_read, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(book_id) DO UPDATE SET
                     record = excluded.record,
                     last_read = excluded.last_read,
                     updated_at = excluded.updated_at
                 WHERE excluded.last_read >= reading_positions.last_read",
                params![book_id, body, last_read, updated_at],
            )
            .with_context(|| "failed to upsert reading position")?;
            Ok(())
        })
        .await
    }

    pub async fn delete_position(&self, book_id: &str) -> Result<()> {
        let book_id = book_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM reading_positions WHERE book_id = ?1",
                params![book_id],
            )
            .with_context(|| "failed to delete reading position")?;
            Ok(())
        })
        .await
    }

    /// Most recently read books first.
    pub async fn recent_positions(&self, limit: usize) -> Result<Vec<PositionSummary>> {
        let limit = to_i64(limit)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT book_id, last_read, updated_at
                 FROM reading_positions
                 ORDER BY last_read DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut summaries = Vec::new();
            while let Some(row) = rows.next()? {
                summaries.push(PositionSummary {
                    book_id: row.get(0)?,
                    last_read: row.get(1)?,
                    updated_at: parse_datetime(&row.get::<_, String>(2)?, "updated_at")?,
                });
            }

            Ok(summaries)
        })
        .await
    }
}

#[async_trait]
impl PositionStore for Database {
    async fn load(&self, book_id: &str) -> Result<Option<Value>> {
        self.load_position(book_id).await
    }

    async fn save(&self, book_id: &str, record: &PersistedPosition) -> Result<()> {
        self.save_position(book_id, record).await
    }

    async fn delete(&self, book_id: &str) -> Result<()> {
        self.delete_position(book_id).await
    }
}
