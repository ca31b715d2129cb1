//! Routes for event ticket listings.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::instrument;
use uuid::Uuid;

use turnstile_reservation::application::query_handlers::{self, TicketAvailabilityView};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /{event_id}/tickets
#[instrument(skip(state))]
async fn list_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<TicketAvailabilityView>>, ApiError> {
    let tickets =
        query_handlers::list_event_tickets(event_id, state.locks.as_ref(), state.bookings.as_ref())
            .await?;
    Ok(Json(tickets))
}

/// Returns the router for event listings.
pub fn router() -> Router<AppState> {
    Router::new().route("/{event_id}/tickets", get(list_tickets))
}
