use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::trigger_auth_middleware;
use crate::state::AppState;

/// Create the application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Delivery webhooks authenticate themselves via HMAC body signatures
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/webhooks/delivery/:channel",
            post(handlers::delivery::handle_delivery),
        );

    // Trigger endpoints require the shared secret
    let trigger_routes = Router::new()
        .route(
            "/api/cadence/:channel/tick",
            post(handlers::trigger::trigger_tick),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            trigger_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(trigger_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
