//! Relational store abstraction for tickets and bookings.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::model::{Booking, EventSummary, NewBooking, Ticket};

/// Repository over the durable ticket and booking rows.
///
/// Ticket rows are mutated only by [`BookingRepository::confirm_booking`];
/// booking rows are inserted `Pending` and moved to a terminal status at most
/// once.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Returns the rows among `ticket_ids` whose durable status is `Available`.
    async fn find_available_tickets(&self, ticket_ids: &[Uuid]) -> Result<Vec<Ticket>, DomainError>;

    /// Inserts a `Pending` booking.
    ///
    /// A second pending booking with the same reference is rejected with
    /// `DomainError::UnavailableTicket`.
    async fn insert_booking(&self, booking: &NewBooking) -> Result<Booking, DomainError>;

    /// Loads a booking by id.
    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, DomainError>;

    /// Loads the pending booking carrying `reference`, if any.
    async fn find_pending_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, DomainError>;

    /// Sells `ticket_ids` to the booking and confirms it in one transaction.
    ///
    /// Tickets are updated under row-level exclusive locks where status is not
    /// `Sold`; the affected row count must equal `ticket_ids.len()`. The
    /// booking is updated where status is `Pending`; exactly one row must
    /// change. Any mismatch rolls the whole transaction back and returns
    /// `DomainError::ConfirmationFailed`.
    async fn confirm_booking(
        &self,
        booking_id: Uuid,
        ticket_ids: &[Uuid],
    ) -> Result<Booking, DomainError>;

    /// Marks a pending booking `Canceled`. Returns whether a row changed.
    async fn cancel_booking(&self, booking_id: Uuid) -> Result<bool, DomainError>;

    /// Looks up the event a ticket belongs to.
    async fn find_event_for_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<EventSummary>, DomainError>;

    /// Lists every ticket of an event, ordered by seat number.
    async fn list_event_tickets(&self, event_id: Uuid) -> Result<Vec<Ticket>, DomainError>;
}
