//! Operator settings API handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use subscout_core::Settings;
use tracing::info;

use super::handlers::{settings_error, ApiError};
use crate::state::AppState;

/// GET /api/v1/settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Result<Json<Settings>, ApiError> {
    state
        .settings_store()
        .get()
        .map(Json)
        .map_err(settings_error)
}

/// PUT /api/v1/settings
///
/// Replaces the settings. The language priority is trimmed and lower-cased;
/// an empty priority list or output path is rejected.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    let settings = state
        .settings_store()
        .update(body)
        .map_err(settings_error)?;

    info!(
        "Settings updated: priority={:?} output={}",
        settings.language_priority, settings.subtitle_output_path
    );
    state.ws_broadcaster().settings_updated(&settings);
    Ok(Json(settings))
}
