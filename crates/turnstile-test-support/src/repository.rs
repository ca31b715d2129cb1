//! Test booking repository.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use turnstile_core::error::DomainError;
use turnstile_core::model::{
    Booking, BookingStatus, EventSummary, NewBooking, Ticket, TicketStatus,
};
use turnstile_core::repository::BookingRepository;
use uuid::Uuid;

/// Builds an `Available` ticket row for `event_id`.
#[must_use]
pub fn ticket(event_id: Uuid, seat_number: &str, price: Decimal) -> Ticket {
    Ticket {
        ticket_id: Uuid::new_v4(),
        event_id,
        seat_number: seat_number.to_owned(),
        price,
        status: TicketStatus::Available,
        booking_id: None,
    }
}

#[derive(Debug, Default)]
struct State {
    events: HashMap<Uuid, bool>,
    tickets: HashMap<Uuid, Ticket>,
    bookings: HashMap<Uuid, Booking>,
    fail_next_insert: bool,
}

/// An in-memory relational store. Every operation runs under one mutex, so
/// `confirm_booking` is atomic the way a database transaction is.
#[derive(Debug, Default)]
pub struct InMemoryBookingRepository {
    state: Mutex<State>,
}

impl InMemoryBookingRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an event.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn add_event(&self, event_id: Uuid, high_demand: bool) {
        self.state.lock().unwrap().events.insert(event_id, high_demand);
    }

    /// Seeds a ticket row.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn add_ticket(&self, ticket: Ticket) {
        self.state
            .lock()
            .unwrap()
            .tickets
            .insert(ticket.ticket_id, ticket);
    }

    /// Returns the current ticket row.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn ticket(&self, ticket_id: Uuid) -> Option<Ticket> {
        self.state.lock().unwrap().tickets.get(&ticket_id).cloned()
    }

    /// Returns the current booking row.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn booking(&self, booking_id: Uuid) -> Option<Booking> {
        self.state.lock().unwrap().bookings.get(&booking_id).cloned()
    }

    /// Returns every booking row.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn bookings(&self) -> Vec<Booking> {
        self.state.lock().unwrap().bookings.values().cloned().collect()
    }

    /// Makes the next `insert_booking` fail with an infrastructure error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next_insert(&self) {
        self.state.lock().unwrap().fail_next_insert = true;
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_available_tickets(&self, ticket_ids: &[Uuid]) -> Result<Vec<Ticket>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(ticket_ids
            .iter()
            .filter_map(|id| state.tickets.get(id))
            .filter(|ticket| ticket.status == TicketStatus::Available)
            .cloned()
            .collect())
    }

    async fn insert_booking(&self, booking: &NewBooking) -> Result<Booking, DomainError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_insert) {
            return Err(DomainError::Infrastructure("insert timed out".into()));
        }
        let duplicate = state.bookings.values().any(|existing| {
            existing.status == BookingStatus::Pending
                && existing.booking_reference == booking.booking_reference
        });
        if duplicate {
            return Err(DomainError::UnavailableTicket {
                ticket_ids: booking.ticket_ids.clone(),
            });
        }
        let row = booking.clone().into_pending();
        state.bookings.insert(row.booking_id, row.clone());
        Ok(row)
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, DomainError> {
        Ok(self.booking(booking_id))
    }

    async fn find_pending_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bookings
            .values()
            .find(|b| b.status == BookingStatus::Pending && b.booking_reference == reference)
            .cloned())
    }

    async fn confirm_booking(
        &self,
        booking_id: Uuid,
        ticket_ids: &[Uuid],
    ) -> Result<Booking, DomainError> {
        let mut state = self.state.lock().unwrap();

        let sellable = ticket_ids
            .iter()
            .filter(|&&id| {
                state
                    .tickets
                    .get(&id)
                    .is_some_and(|t| t.status != TicketStatus::Sold)
            })
            .count();
        if sellable != ticket_ids.len() {
            return Err(DomainError::ConfirmationFailed(format!(
                "expected {} tickets to be sold, {sellable} were sellable",
                ticket_ids.len()
            )));
        }
        let pending = state
            .bookings
            .get(&booking_id)
            .is_some_and(|b| b.status == BookingStatus::Pending);
        if !pending {
            return Err(DomainError::ConfirmationFailed(format!(
                "booking {booking_id} is not pending"
            )));
        }

        for id in ticket_ids {
            if let Some(ticket) = state.tickets.get_mut(id) {
                ticket.status = TicketStatus::Sold;
                ticket.booking_id = Some(booking_id);
            }
        }
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(DomainError::NotFound(booking_id))?;
        booking.status = BookingStatus::Confirmed;
        Ok(booking.clone())
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<bool, DomainError> {
        let mut state = self.state.lock().unwrap();
        Ok(match state.bookings.get_mut(&booking_id) {
            Some(booking) if booking.status == BookingStatus::Pending => {
                booking.status = BookingStatus::Canceled;
                true
            }
            _ => false,
        })
    }

    async fn find_event_for_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<EventSummary>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state.tickets.get(&ticket_id).map(|ticket| EventSummary {
            event_id: ticket.event_id,
            high_demand: state.events.get(&ticket.event_id).copied().unwrap_or(false),
        }))
    }

    async fn list_event_tickets(&self, event_id: Uuid) -> Result<Vec<Ticket>, DomainError> {
        let state = self.state.lock().unwrap();
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        Ok(tickets)
    }
}
