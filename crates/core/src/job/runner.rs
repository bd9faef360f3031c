//! Background scan jobs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{Job, JobStatus, JobStore, SCAN_JOB};
use crate::media::{FilesystemScanner, MediaStore, ScanResult, UpsertSummary};
use crate::metrics;
use crate::storage::StorageError;

/// Called with the job after every status transition.
pub type JobUpdateCallback = Arc<dyn Fn(&Job) + Send + Sync>;

const SCAN_DESCRIPTION: &str = "Scan media library for missing subtitles";

/// Runs library scans as background jobs: walk the media roots off the
/// async runtime, upsert the results and record the outcome on the job.
pub struct ScanJobRunner {
    job_store: Arc<dyn JobStore>,
    media_store: Arc<dyn MediaStore>,
    scanner: FilesystemScanner,
    media_paths: Vec<String>,
    timeout: Duration,
    on_update: Option<JobUpdateCallback>,
}

impl ScanJobRunner {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        media_store: Arc<dyn MediaStore>,
        media_paths: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            job_store,
            media_store,
            scanner: FilesystemScanner::new(),
            media_paths,
            timeout,
            on_update: None,
        }
    }

    /// Set a callback for job status transitions.
    pub fn with_update_callback(mut self, callback: JobUpdateCallback) -> Self {
        self.on_update = Some(callback);
        self
    }

    /// Create a queued scan job and run it in the background.
    pub fn spawn(self: &Arc<Self>) -> Result<Job, StorageError> {
        let job = self.job_store.create(SCAN_JOB, SCAN_DESCRIPTION)?;
        self.notify(&job);

        let runner = Arc::clone(self);
        let job_id = job.id.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(&job_id).await {
                warn!("Failed to record scan job {}: {}", job_id, e);
            }
        });

        Ok(job)
    }

    /// Run an existing job to completion. Scan failures are recorded on the
    /// job; only storage errors while recording are returned.
    pub async fn run(&self, job_id: &str) -> Result<Job, StorageError> {
        let job = self
            .job_store
            .update_status(job_id, JobStatus::Running, None, "")?;
        self.notify(&job);
        info!("Scan job {} started for {} roots", job_id, self.media_paths.len());

        let job = match self.scan_and_store().await {
            Ok((result, summary)) => {
                let details = completion_details(&result, &summary);
                metrics::SCANS_TOTAL.with_label_values(&["completed"]).inc();
                info!("Scan job {} completed: {}", job_id, details);
                self.job_store
                    .update_status(job_id, JobStatus::Completed, Some(&details), "")?
            }
            Err((label, message)) => {
                metrics::SCANS_TOTAL.with_label_values(&[label]).inc();
                warn!("Scan job {} failed: {}", job_id, message);
                self.job_store
                    .update_status(job_id, JobStatus::Failed, None, &message)?
            }
        };

        self.notify(&job);
        Ok(job)
    }

    async fn scan_and_store(&self) -> Result<(ScanResult, UpsertSummary), (&'static str, String)> {
        let scanner = self.scanner.clone();
        let roots = self.media_paths.clone();
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&roots));

        let result = match tokio::time::timeout(self.timeout, scan).await {
            Err(_) => {
                return Err((
                    "timeout",
                    format!("scan timed out after {}s", self.timeout.as_secs()),
                ))
            }
            Ok(Err(e)) => return Err(("failed", format!("scan task failed: {}", e))),
            Ok(Ok(Err(e))) => return Err(("failed", e.to_string())),
            Ok(Ok(Ok(result))) => result,
        };

        for root_error in &result.root_errors {
            warn!("{}", root_error);
        }
        metrics::VIDEO_FILES_SCANNED.inc_by(result.scanned_video_files as u64);

        let summary = self
            .media_store
            .upsert_many(&result.items)
            .map_err(|e| ("failed", e.to_string()))?;
        Ok((result, summary))
    }

    fn notify(&self, job: &Job) {
        if let Some(callback) = &self.on_update {
            callback(job);
        }
    }
}

fn completion_details(result: &ScanResult, summary: &UpsertSummary) -> String {
    let mut details = format!(
        "Scanned {} video files, missing subtitles {}, inserted {}, updated {}",
        result.scanned_video_files, result.missing_subtitle_files, summary.inserted, summary.updated
    );
    if !result.root_errors.is_empty() {
        details.push_str(&format!(", unreadable roots {}", result.root_errors.len()));
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SqliteJobStore;
    use crate::media::{MediaFilter, SqliteMediaStore};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn runner(paths: Vec<String>) -> (ScanJobRunner, Arc<SqliteMediaStore>, Arc<SqliteJobStore>) {
        let media = Arc::new(SqliteMediaStore::in_memory().unwrap());
        let jobs = Arc::new(SqliteJobStore::in_memory().unwrap());
        let runner = ScanJobRunner::new(jobs.clone(), media.clone(), paths, Duration::from_secs(30));
        (runner, media, jobs)
    }

    #[tokio::test]
    async fn test_run_scan_job_completes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Movie.Name.2010.mkv"), b"").unwrap();
        fs::write(dir.path().join("Show.S01E02.mp4"), b"").unwrap();
        fs::write(dir.path().join("Show.S01E02.en.srt"), b"").unwrap();

        let (runner, media, jobs) = runner(vec![dir.path().to_string_lossy().to_string()]);
        let seen: Arc<Mutex<Vec<JobStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let runner = runner.with_update_callback(Arc::new(move |job: &Job| {
            sink.lock().unwrap().push(job.status);
        }));

        let job = jobs.create(SCAN_JOB, SCAN_DESCRIPTION).unwrap();
        let finished = runner.run(&job.id).await.unwrap();

        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(
            finished.details,
            "Scanned 2 video files, missing subtitles 1, inserted 2, updated 0"
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec![JobStatus::Running, JobStatus::Completed]
        );

        let items = media.list(&MediaFilter::default()).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_root_completes_empty() {
        let (runner, _media, jobs) = runner(vec!["/definitely/missing/root".to_string()]);
        let job = jobs.create(SCAN_JOB, SCAN_DESCRIPTION).unwrap();
        let finished = runner.run(&job.id).await.unwrap();

        // Missing roots are skipped, not failures.
        assert_eq!(finished.status, JobStatus::Completed);
        assert!(finished.details.starts_with("Scanned 0 video files"));
    }

    #[tokio::test]
    async fn test_spawn_returns_queued_job() {
        let dir = TempDir::new().unwrap();
        let (runner, _media, jobs) = runner(vec![dir.path().to_string_lossy().to_string()]);
        let runner = Arc::new(runner);

        let job = runner.spawn().unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let mut status = JobStatus::Queued;
        for _ in 0..50 {
            status = jobs.get(&job.id).unwrap().unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_run_unknown_job_is_storage_error() {
        let (runner, _media, _jobs) = runner(vec![]);
        assert!(matches!(
            runner.run("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
