//! Provider status and credential API handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use subscout_core::{seal_fields, CredentialError, ProviderStatus};
use tracing::info;

use super::handlers::{api_error, search_error, storage_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderStatus>,
}

#[derive(Debug, Serialize)]
pub struct CredentialSavedResponse {
    pub provider: String,
    pub configured: bool,
}

/// GET /api/v1/providers
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProvidersResponse>, ApiError> {
    let providers = state
        .orchestrator()
        .provider_statuses()
        .map_err(search_error)?;
    Ok(Json(ProvidersResponse { providers }))
}

/// PUT /api/v1/providers/{name}/credentials
///
/// Body is a JSON object of string fields, e.g. `{"token": "..."}` or
/// `{"api_key": "...", "username": "...", "password": "..."}`. Blank fields
/// are dropped; at least one must remain.
pub async fn save_credentials(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(fields): Json<HashMap<String, String>>,
) -> Result<Json<CredentialSavedResponse>, ApiError> {
    if state.orchestrator().registry().get(&name).is_none() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown provider: {}", name),
        ));
    }

    let blob = seal_fields(&fields, state.app_secret()).map_err(|e| {
        let status = if matches!(e, CredentialError::Empty) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        api_error(status, e.to_string())
    })?;

    state
        .credential_store()
        .save_blob(&name, &blob)
        .map_err(storage_error)?;

    info!("Saved credential for provider {}", name);
    state.ws_broadcaster().credential_saved(&name);

    Ok(Json(CredentialSavedResponse {
        provider: name,
        configured: true,
    }))
}
