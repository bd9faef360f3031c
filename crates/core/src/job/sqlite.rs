//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Job, JobStatus, JobStore, DEFAULT_JOB_LIMIT};
use crate::storage::{self, StorageError};

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = storage::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
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
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                job_type TEXT NOT NULL,
                status TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '',
                error TEXT NOT NULL DEFAULT '',
                retries INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at DESC);
            "#,
        )?;
        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status: String = row.get(2)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;

        Ok(Job {
            id: row.get(0)?,
            job_type: row.get(1)?,
            status: JobStatus::from_db(&status),
            details: row.get(3)?,
            error: row.get(4)?,
            retries: row.get(5)?,
            created_at: storage::parse_timestamp(&created_at),
            updated_at: storage::parse_timestamp(&updated_at),
        })
    }

    fn get_with(conn: &Connection, id: &str) -> Result<Option<Job>, StorageError> {
        Ok(conn
            .query_row(
                "SELECT id, job_type, status, details, error, retries, created_at, updated_at FROM jobs WHERE id = ?",
                params![id],
                Self::row_to_job,
            )
            .optional()?)
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, job_type: &str, details: &str) -> Result<Job, StorageError> {
        let now = Utc::now();
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            job_type: job_type.to_string(),
            status: JobStatus::Queued,
            details: details.to_string(),
            error: String::new(),
            retries: 0,
            created_at: now,
            updated_at: now,
        };

        let conn = storage::lock(&self.conn)?;
        conn.execute(
            "INSERT INTO jobs (id, job_type, status, details, error, retries, created_at, updated_at)
             VALUES (?, ?, ?, ?, '', 0, ?, ?)",
            params![
                job.id,
                job.job_type,
                job.status.as_str(),
                job.details,
                now.to_rfc3339(),
                now.to_rfc3339()
            ],
        )?;

        Ok(job)
    }

    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        details: Option<&str>,
        error: &str,
    ) -> Result<Job, StorageError> {
        let conn = storage::lock(&self.conn)?;
        let rows = conn.execute(
            "UPDATE jobs SET status = ?, details = COALESCE(?, details), error = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), details, error, Utc::now().to_rfc3339(), id],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(format!("job {}", id)));
        }

        Self::get_with(&conn, id)?.ok_or_else(|| StorageError::NotFound(format!("job {}", id)))
    }

    fn get(&self, id: &str) -> Result<Option<Job>, StorageError> {
        let conn = storage::lock(&self.conn)?;
        Self::get_with(&conn, id)
    }

    fn list(&self, limit: i64) -> Result<Vec<Job>, StorageError> {
        let limit = if limit <= 0 { DEFAULT_JOB_LIMIT } else { limit };
        let conn = storage::lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, job_type, status, details, error, retries, created_at, updated_at
             FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )?;
        let rows = stmt.query_map(params![limit], Self::row_to_job)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }
}
