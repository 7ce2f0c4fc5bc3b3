//! HTTP API.

mod handlers;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::engine::AUDIO_ROUTE;

pub use handlers::{ApiError, AppState, GenerateBody, GenerateResponse};

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let audio = ServeDir::new(state.manager.output_dir());

    Router::new()
        .route("/api/voices", get(handlers::list_voices))
        .route("/api/generate", post(handlers::generate))
        .route("/api/status/{task_id}", get(handlers::task_status))
        .route("/api/health", get(handlers::health))
        .route("/api/models", get(handlers::list_models))
        .route("/api/diagnostics", get(handlers::diagnostics))
        .nest_service(AUDIO_ROUTE, audio)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
