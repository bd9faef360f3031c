//! SQLite-backed candidate store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CandidateStore, SubtitleCandidate};
use crate::storage::{self, StorageError};

const SELECT_COLUMNS: &str = "media_id, provider, candidate_id, title, release_name, language, language_label, score, relevance, details, raw_payload, expires_at, created_at";

/// SQLite-backed candidate store.
pub struct SqliteCandidateStore {
    conn: Mutex<Connection>,
}

impl SqliteCandidateStore {
    /// Create a new SQLite candidate store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = storage::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite candidate store (useful for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = storage::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS subtitle_candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                media_id INTEGER NOT NULL,
                provider TEXT NOT NULL,
                candidate_id TEXT NOT NULL,
                title TEXT NOT NULL,
                release_name TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL,
                language_label TEXT NOT NULL DEFAULT '',
                score REAL NOT NULL,
                relevance REAL NOT NULL DEFAULT 0,
                details TEXT NOT NULL DEFAULT '',
                raw_payload TEXT NOT NULL DEFAULT '',
                expires_at TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(media_id, provider, candidate_id)
            );

            CREATE INDEX IF NOT EXISTS idx_subtitle_candidates_media ON subtitle_candidates(media_id, score DESC);
            "#,
        )?;
        Ok(())
    }

    fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<SubtitleCandidate> {
        let expires_at: Option<String> = row.get(11)?;
        let created_at: String = row.get(12)?;

        Ok(SubtitleCandidate {
            media_id: row.get(0)?,
            provider: row.get(1)?,
            candidate_id: row.get(2)?,
            title: row.get(3)?,
            release_name: row.get(4)?,
            language: row.get(5)?,
            language_label: row.get(6)?,
            score: row.get(7)?,
            relevance: row.get(8)?,
            details: row.get(9)?,
            raw_payload: row.get(10)?,
            expires_at: expires_at
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            created_at: storage::parse_timestamp(&created_at),
        })
    }
}

impl CandidateStore for SqliteCandidateStore {
    fn replace_for_media(
        &self,
        media_id: i64,
        candidates: &[SubtitleCandidate],
    ) -> Result<(), StorageError> {
        let mut conn = storage::lock(&self.conn)?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM subtitle_candidates WHERE media_id = ?",
            params![media_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO subtitle_candidates (media_id, provider, candidate_id, title, release_name, language, language_label, score, relevance, details, raw_payload, expires_at, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;

            for candidate in candidates {
                stmt.execute(params![
                    media_id,
                    candidate.provider,
                    candidate.candidate_id,
                    candidate.title,
                    candidate.release_name,
                    candidate.language,
                    candidate.language_label,
                    candidate.score,
                    candidate.relevance,
                    candidate.details,
                    candidate.raw_payload,
                    candidate.expires_at.map(|t| t.to_rfc3339()),
                    candidate.created_at.to_rfc3339(),
                ])?;
            }
        }

        // Dropping the transaction without commit rolls back.
        tx.commit()?;
        Ok(())
    }

    fn list_for_media(
        &self,
        media_id: i64,
        limit: i64,
    ) -> Result<Vec<SubtitleCandidate>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM subtitle_candidates WHERE media_id = ? ORDER BY score DESC, id ASC LIMIT ?",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![media_id, limit], Self::row_to_candidate)?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?);
        }
        Ok(candidates)
    }

    fn get(
        &self,
        media_id: i64,
        provider: &str,
        candidate_id: &str,
    ) -> Result<Option<SubtitleCandidate>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM subtitle_candidates WHERE media_id = ? AND provider = ? AND candidate_id = ?",
            SELECT_COLUMNS
        );
        Ok(conn
            .query_row(
                &sql,
                params![media_id, provider, candidate_id],
                Self::row_to_candidate,
            )
            .optional()?)
    }
}
