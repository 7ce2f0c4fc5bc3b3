//! HTTP handlers for the generation API.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::backend::Model;
use crate::engine::{
    DevicePreference, Diagnostics, GenerateError, GenerationRequest, ModelInfo, Task, TaskManager,
};
use crate::voice::VoiceReference;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TaskManager>,
}

impl AppState {
    pub fn new(manager: TaskManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}

/// Errors returned to HTTP clients as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<GenerateError> for ApiError {
    fn from(err: GenerateError) -> Self {
        if err.is_validation() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub voice: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub task_id: String,
}

/// `GET /api/voices`
pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<VoiceReference>> {
    Json(state.manager.voices().to_vec())
}

/// `POST /api/generate`
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let device = match body.device.as_deref() {
        Some(device) => device
            .parse::<DevicePreference>()
            .map_err(ApiError::BadRequest)?,
        None => DevicePreference::Auto,
    };
    let model = match body.model.as_deref() {
        Some(model) => model.parse::<Model>().map_err(ApiError::BadRequest)?,
        None => Model::Simple,
    };

    let request = GenerationRequest::new(body.text, body.voice)
        .with_device(device)
        .with_model(model);

    let task_id = state.manager.submit(request).inspect_err(|err| {
        tracing::info!(error = %err, "generation request rejected");
    })?;

    Ok(Json(GenerateResponse { task_id }))
}

/// `GET /api/status/{task_id}`
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    state
        .manager
        .status(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /api/models`
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.manager.models())
}

/// `GET /api/diagnostics`
pub async fn diagnostics(State(state): State<AppState>) -> Result<Json<Diagnostics>, ApiError> {
    let manager = Arc::clone(&state.manager);

    tokio::task::spawn_blocking(move || manager.diagnostics())
        .await
        .map(Json)
        .map_err(|err| ApiError::Internal(format!("Diagnostics failed: {err}")))
}
