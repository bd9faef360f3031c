//! Background job API handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use subscout_core::{job::DEFAULT_JOB_LIMIT, Job};

use super::handlers::{storage_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
}

/// POST /api/v1/scan
///
/// Queue a library scan. Progress is published as `job_update` messages.
pub async fn start_scan(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state.scan_runner().spawn().map_err(storage_error)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /api/v1/jobs?limit=
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params
        .limit
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_JOB_LIMIT)
        .min(MAX_LIMIT);
    let jobs = state.job_store().list(limit).map_err(storage_error)?;
    Ok(Json(ListJobsResponse { jobs }))
}
