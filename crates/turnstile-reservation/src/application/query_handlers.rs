//! Query handlers for the Reservation Engine.

use rust_decimal::Decimal;
use serde::Serialize;
use turnstile_core::error::DomainError;
use turnstile_core::lock::SoftLockStore;
use turnstile_core::model::{Booking, TicketStatus};
use turnstile_core::repository::BookingRepository;
use uuid::Uuid;

/// A ticket as a buyer sees it right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketAvailabilityView {
    /// Ticket identifier.
    pub ticket_id: Uuid,
    /// Seat label.
    pub seat_number: String,
    /// Face value.
    pub price: Decimal,
    /// `Sold` from the durable row, `Reserved` while a soft lock is live,
    /// otherwise `Available`.
    pub status: TicketStatus,
}

/// Retrieves a booking by ID.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no booking exists for the ID.
pub async fn get_booking(
    booking_id: Uuid,
    repo: &dyn BookingRepository,
) -> Result<Booking, DomainError> {
    repo.find_booking(booking_id)
        .await?
        .ok_or(DomainError::NotFound(booking_id))
}

/// Lists an event's tickets with their effective status, overlaying live
/// soft locks on the durable rows.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if either store fails.
pub async fn list_event_tickets(
    event_id: Uuid,
    locks: &dyn SoftLockStore,
    repo: &dyn BookingRepository,
) -> Result<Vec<TicketAvailabilityView>, DomainError> {
    let tickets = repo.list_event_tickets(event_id).await?;
    let unsold: Vec<Uuid> = tickets
        .iter()
        .filter(|t| t.status != TicketStatus::Sold)
        .map(|t| t.ticket_id)
        .collect();
    let locked = locks.are_available(&unsold).await?.blocked_ids;

    Ok(tickets
        .into_iter()
        .map(|t| {
            let status = match t.status {
                TicketStatus::Sold => TicketStatus::Sold,
                _ if locked.contains(&t.ticket_id) => TicketStatus::Reserved,
                _ => TicketStatus::Available,
            };
            TicketAvailabilityView {
                ticket_id: t.ticket_id,
                seat_number: t.seat_number,
                price: t.price,
                status,
            }
        })
        .collect())
}
