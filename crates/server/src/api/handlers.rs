use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use subscout_core::{SanitizedConfig, SearchError, SettingsError, StorageError};
use tracing::error;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body returned by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Status code plus JSON error body.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn storage_error(e: StorageError) -> ApiError {
    match e {
        StorageError::NotFound(what) => api_error(StatusCode::NOT_FOUND, format!("{} not found", what)),
        other => {
            error!("Storage error: {}", other);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub fn settings_error(e: SettingsError) -> ApiError {
    match e {
        SettingsError::Validation(message) => api_error(StatusCode::BAD_REQUEST, message),
        SettingsError::Storage(e) => storage_error(e),
    }
}

pub fn search_error(e: SearchError) -> ApiError {
    let status = match &e {
        SearchError::Validation(_) => StatusCode::BAD_REQUEST,
        SearchError::NotFound(_) => StatusCode::NOT_FOUND,
        SearchError::AlreadyExists(_) => StatusCode::CONFLICT,
        SearchError::Credential { .. } | SearchError::Provider { .. } => StatusCode::BAD_GATEWAY,
        SearchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SearchError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
        SearchError::Storage(_) | SearchError::Io(_) => {
            error!("Search request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /metrics
///
/// Prometheus text exposition of server and core metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
