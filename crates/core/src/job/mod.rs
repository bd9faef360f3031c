//! Background jobs (library scans) and their persisted status.

mod runner;
mod sqlite;

pub use runner::{JobUpdateCallback, ScanJobRunner};
pub use sqlite::SqliteJobStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::StorageError;

/// Job type of library scans.
pub const SCAN_JOB: &str = "scan";

/// Default number of jobs returned by a listing.
pub const DEFAULT_JOB_LIMIT: i64 = 50;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the stored form. Unknown values read as `Failed`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A background job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// UUID v4.
    pub id: String,
    pub job_type: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trait for job storage.
pub trait JobStore: Send + Sync {
    /// Create a queued job.
    fn create(&self, job_type: &str, details: &str) -> Result<Job, StorageError>;

    /// Set the status of a job. `details` replaces the stored details when
    /// given. Returns the updated job.
    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        details: Option<&str>,
        error: &str,
    ) -> Result<Job, StorageError>;

    fn get(&self, id: &str) -> Result<Option<Job>, StorageError>;

    /// Most recent jobs first.
    fn list(&self, limit: i64) -> Result<Vec<Job>, StorageError>;
}
