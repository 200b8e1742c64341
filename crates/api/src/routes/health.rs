use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` once any snapshot failed to persist.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Snapshots that could not be written since startup.
    pub failed_writes: usize,
}

/// GET /health -- returns service and persistence health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let failed_writes = state.flush.failed_writes();
    let status = if failed_writes == 0 { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        failed_writes,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
