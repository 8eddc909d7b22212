use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub redis: &'static str,
}

/// Liveness plus dependency health
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.db_pool.health_check().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    let redis = match state.redis_pool.health_check().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    let healthy = database == "up" && redis == "up";
    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        database,
        redis,
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
