use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the annotation store accepts writes.
    pub store_writable: bool,
}

/// GET /health -- returns service and storage health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_writable = state.annotations.store().is_writable().await;

    let status = if store_writable { "ok" } else { "degraded" };
    if !store_writable {
        tracing::warn!(root = %state.annotations.store().root().display(), "Annotation store is not writable");
    }

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store_writable,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
