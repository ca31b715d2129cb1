//! Routes for the Reservation Engine.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use turnstile_core::model::Booking;
use uuid::Uuid;

use turnstile_reservation::application::command_handlers::{self, ReservationReceipt};
use turnstile_reservation::application::query_handlers;
use turnstile_reservation::domain::commands;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    /// Buyer.
    pub user_id: Uuid,
    /// Tickets to reserve.
    pub ticket_ids: Vec<Uuid>,
}

/// POST /
#[instrument(skip(state, request), fields(user_id = %request.user_id))]
async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationReceipt>), ApiError> {
    let command = commands::CreateReservation {
        correlation_id: Uuid::new_v4(),
        user_id: request.user_id,
        ticket_ids: request.ticket_ids,
    };

    info!(correlation_id = %command.correlation_id, "handling create_reservation command");

    let receipt = command_handlers::handle_create_reservation(
        &command,
        &state.reservation,
        state.clock.as_ref(),
        state.locks.as_ref(),
        state.bookings.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// PATCH /{booking_id}
#[instrument(skip(state))]
async fn confirm_reservation(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let command = commands::ConfirmReservation {
        correlation_id: Uuid::new_v4(),
        booking_id,
    };

    info!(correlation_id = %command.correlation_id, "handling confirm_reservation command");

    let booking = command_handlers::handle_confirm_reservation(
        &command,
        &state.reservation,
        state.clock.as_ref(),
        state.locks.as_ref(),
        state.bookings.as_ref(),
        state.publisher.as_ref(),
    )
    .await?;

    Ok(Json(booking))
}

/// GET /{booking_id}
#[instrument(skip(state))]
async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    let booking = query_handlers::get_booking(booking_id, state.bookings.as_ref()).await?;
    Ok(Json(booking))
}

/// Returns the router for the reservation engine.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation))
        .route("/{booking_id}", get(get_booking).patch(confirm_reservation))
}
