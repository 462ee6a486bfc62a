//! System endpoints: health check and the model catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::model_registry::ModelConfig;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/models` — The supported model catalog.
#[utoipa::path(
    get,
    path = "/config/models",
    tag = "System",
    summary = "List supported generation models",
    description = "Returns id, pricing, and capability metadata for every model the gateway can bill and dispatch.",
    responses(
        (status = 200, description = "Model catalog", body = [ModelConfig]),
    )
)]
pub async fn models_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.registry.all()))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/models", get(models_handler))
}
