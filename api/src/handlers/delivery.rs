use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use common::cadence::delivery::DeliveryOutcome;
use common::errors::WebhookError;
use common::models::{Channel, DeliveryEvent};
use common::signing::validate_signature;

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Inbound delivery webhook. Authenticated by an HMAC-SHA256 hex
/// signature over the raw body, checked before any state is read.
#[tracing::instrument(skip(state, headers, body))]
pub async fn handle_delivery(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeliveryOutcome>, (StatusCode, Json<ErrorResponse>)> {
    let channel: Channel = channel.parse().map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("not_found", "Unknown channel")),
        )
    })?;

    let signature = headers
        .get("x-webhook-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("unauthorized", "Missing signature")),
            )
        })?;

    if !validate_signature(&body, signature, &state.config.security.webhook_secret) {
        tracing::warn!(channel = %channel, "Invalid delivery webhook signature");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("unauthorized", "Invalid signature")),
        ));
    }

    let event: DeliveryEvent = serde_json::from_slice(&body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "validation_error",
                format!("Invalid payload: {}", e),
            )),
        )
    })?;

    let outcome = state.delivery.apply(channel, &event).await.map_err(|e| {
        let (code, error) = match &e {
            WebhookError::UnknownMessage(_) => (StatusCode::NOT_FOUND, "not_found"),
            WebhookError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        (code, Json(ErrorResponse::new(error, e.to_string())))
    })?;

    Ok(Json(outcome))
}
