use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, jobs, media, middleware::metrics_middleware, providers, settings, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Settings
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        // Providers
        .route("/providers", get(providers::list_providers))
        .route(
            "/providers/{name}/credentials",
            put(providers::save_credentials),
        )
        // Library scans
        .route("/scan", post(jobs::start_scan))
        .route("/jobs", get(jobs::list_jobs))
        // Media, search and download
        .route("/media", get(media::list_media))
        .route("/media/{id}", get(media::get_media))
        .route("/media/{id}/search", post(media::search_media))
        .route("/media/{id}/candidates", get(media::list_candidates))
        .route("/media/{id}/download", post(media::download_subtitle))
        // Real-time updates
        .route("/ws", get(ws::ws_handler))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
