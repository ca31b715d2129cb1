//! Turnstile API server library.
//!
//! Exposes the router, state, configuration, realtime hub and relay so the binary
//! and the integration tests assemble the same application.

pub mod bridge;
pub mod config;
pub mod error;
pub mod hub;
pub mod relay;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;

use crate::state::AppState;

/// Builds the application router over `state`, without middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::queue::router())
        .nest("/api/v1/reservations", routes::reservations::router())
        .nest("/api/v1/events", routes::events::router())
        .with_state(state)
}
