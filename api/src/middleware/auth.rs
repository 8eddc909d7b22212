use axum::{
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use common::signing::verify_shared_secret;

use crate::state::AppState;

const TRIGGER_SECRET_HEADER: &str = "x-cadence-secret";

/// Shared-secret check for the trigger endpoints. Runs before any state
/// is read; unauthenticated callers never reach the engine.
#[tracing::instrument(skip(state, req, next))]
pub async fn trigger_auth_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    authorize(req.headers(), &state.config.security.trigger_secret)?;
    Ok(next.run(req).await)
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), StatusCode> {
    let provided = headers
        .get(TRIGGER_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_shared_secret(provided, expected) {
        tracing::warn!("Trigger secret mismatch");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}
