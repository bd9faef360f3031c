//! Media library, search and download API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use subscout_core::{DownloadOutcome, MediaFilter, MediaItem, SearchOutcome, SubtitleCandidate};

use super::handlers::{api_error, search_error, settings_error, storage_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for list queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for media listings
const DEFAULT_MEDIA_LIMIT: i64 = 200;

/// Default limit for candidate listings
const DEFAULT_CANDIDATE_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing media
#[derive(Debug, Deserialize)]
pub struct ListMediaParams {
    /// Only items without a subtitle
    #[serde(default)]
    pub missing_sub: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListMediaResponse {
    pub items: Vec<MediaItem>,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub media_id: i64,
    pub candidates: Vec<SubtitleCandidate>,
}

/// Request body for downloading a stored candidate
#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub provider: String,
    pub candidate_id: String,
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    match limit {
        Some(limit) if limit > 0 => limit.min(MAX_LIMIT),
        _ => default,
    }
}

fn load_media(state: &AppState, id: i64) -> Result<MediaItem, ApiError> {
    state
        .media_store()
        .get(id)
        .map_err(storage_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Media item not found: {}", id)))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/media?missing_sub=&limit=
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListMediaParams>,
) -> Result<Json<ListMediaResponse>, ApiError> {
    let limit = clamp_limit(params.limit, DEFAULT_MEDIA_LIMIT);
    let filter = MediaFilter {
        missing_subtitle_only: params.missing_sub,
        limit,
    };
    let items = state.media_store().list(&filter).map_err(storage_error)?;
    Ok(Json(ListMediaResponse { items, limit }))
}

/// GET /api/v1/media/{id}
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MediaItem>, ApiError> {
    load_media(&state, id).map(Json)
}

/// POST /api/v1/media/{id}/search
///
/// Search every credentialed provider and replace the stored candidates.
/// Provider failures are reported in `errors`; the request itself succeeds.
pub async fn search_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let media = load_media(&state, id)?;
    let settings = state.settings_store().get().map_err(settings_error)?;

    let cancel = state.shutdown_token().child_token();
    let outcome = state
        .orchestrator()
        .search(&media, &settings, &cancel)
        .await
        .map_err(search_error)?;

    state.ws_broadcaster().candidates_updated(&outcome);
    Ok(Json(outcome))
}

/// GET /api/v1/media/{id}/candidates?limit=
pub async fn list_candidates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    load_media(&state, id)?;
    let limit = clamp_limit(params.limit, DEFAULT_CANDIDATE_LIMIT);
    let candidates = state
        .candidate_store()
        .list_for_media(id, limit)
        .map_err(storage_error)?;
    Ok(Json(CandidatesResponse {
        media_id: id,
        candidates,
    }))
}

/// POST /api/v1/media/{id}/download
///
/// Download a stored candidate next to the configured output path.
/// Existing subtitle files are never replaced (409).
pub async fn download_subtitle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<DownloadBody>,
) -> Result<(StatusCode, Json<DownloadOutcome>), ApiError> {
    if body.provider.trim().is_empty() || body.candidate_id.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "provider and candidate_id are required",
        ));
    }

    let settings = state.settings_store().get().map_err(settings_error)?;
    let outcome = state
        .orchestrator()
        .download(id, body.provider.trim(), body.candidate_id.trim(), &settings)
        .await
        .map_err(search_error)?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 200), 200);
        assert_eq!(clamp_limit(Some(0), 200), 200);
        assert_eq!(clamp_limit(Some(-3), 100), 100);
        assert_eq!(clamp_limit(Some(25), 200), 25);
        assert_eq!(clamp_limit(Some(5000), 200), MAX_LIMIT);
    }
}
