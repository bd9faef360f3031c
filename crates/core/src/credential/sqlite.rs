//! SQLite-backed credential store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{CredentialStore, CredentialSummary};
use crate::storage::{self, StorageError};

/// SQLite-backed credential store.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    /// Create a new SQLite credential store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = storage::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite credential store (useful for testing).
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
            CREATE TABLE IF NOT EXISTS provider_credentials (
                name TEXT PRIMARY KEY,
                secret_blob TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn ensure_providers(&self, providers: &[&str]) -> Result<(), StorageError> {
        let conn = storage::lock(&self.conn)?;
        let now = Utc::now().to_rfc3339();
        for provider in providers {
            conn.execute(
                "INSERT INTO provider_credentials (name, secret_blob, updated_at) VALUES (?, '', ?)
                 ON CONFLICT(name) DO NOTHING",
                params![provider, now],
            )?;
        }
        Ok(())
    }

    fn get_blob(&self, provider: &str) -> Result<Option<String>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        Ok(conn
            .query_row(
                "SELECT secret_blob FROM provider_credentials WHERE name = ?",
                params![provider],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn save_blob(&self, provider: &str, blob: &str) -> Result<(), StorageError> {
        let conn = storage::lock(&self.conn)?;
        conn.execute(
            "INSERT INTO provider_credentials (name, secret_blob, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET secret_blob = excluded.secret_blob, updated_at = excluded.updated_at",
            params![provider, blob, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<CredentialSummary>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let mut stmt = conn
            .prepare("SELECT name, secret_blob, updated_at FROM provider_credentials ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            let blob: String = row.get(1)?;
            let updated_at: String = row.get(2)?;
            Ok(CredentialSummary {
                provider: row.get(0)?,
                configured: !blob.trim().is_empty(),
                updated_at: storage::parse_timestamp(&updated_at),
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}
