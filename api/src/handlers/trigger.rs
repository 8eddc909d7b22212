use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::time::Duration;

use common::cadence::TickOutcome;
use common::errors::CadenceError;
use common::models::Channel;

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Run one cadence tick for a channel.
///
/// Idempotent-safe to call more often than needed: excess calls land on
/// the throttling no-op outcomes. The whole tick runs under the
/// configured wall-clock budget; on timeout the invocation is abandoned
/// and any writes that already happened stand (at-least-once transport
/// semantics).
#[tracing::instrument(skip(state))]
pub async fn trigger_tick(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<TickOutcome>, (StatusCode, Json<ErrorResponse>)> {
    let channel: Channel = channel.parse().map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("not_found", "Unknown channel")),
        )
    })?;

    let engine = state.engine_for(channel);
    let budget = Duration::from_secs(state.config.cadence.tick_budget_seconds);

    let outcome = tokio::time::timeout(budget, engine.run_tick())
        .await
        .map_err(|_| {
            tracing::error!(channel = %channel, "Tick abandoned after exceeding budget");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("tick_timeout", "Tick exceeded its budget")),
            )
        })?
        .map_err(|e| {
            let (code, error) = match &e {
                CadenceError::MissingSettings => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "cadence_error"),
            };
            (code, Json(ErrorResponse::new(error, e.to_string())))
        })?;

    Ok(Json(outcome))
}
