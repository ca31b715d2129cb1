//! Durable domain records: tickets, bookings and events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Durable status of a ticket row.
///
/// Rows are written `Available` at seed time and `Sold` by the confirmation
/// transaction. `Reserved` is what a reader sees while a soft lock is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Contestable.
    Available,
    /// Held by a live soft lock.
    Reserved,
    /// Terminal.
    Sold,
}

impl TicketStatus {
    /// Database/wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Reserved => "Reserved",
            Self::Sold => "Sold",
        }
    }

    /// Returns `true` if a ticket may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Available, Self::Reserved)
                | (Self::Reserved, Self::Sold | Self::Available)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(Self::Available),
            "Reserved" => Ok(Self::Reserved),
            "Sold" => Ok(Self::Sold),
            other => Err(DomainError::Validation(format!(
                "unknown ticket status: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Created alongside the soft locks; awaiting confirmation.
    Pending,
    /// Terminal: tickets sold.
    Confirmed,
    /// Terminal: locks lapsed or confirmation failed.
    Canceled,
}

impl BookingStatus {
    /// Database/wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Canceled => "Canceled",
        }
    }

    /// Returns `true` for `Confirmed` and `Canceled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns `true` if a booking may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Canceled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Canceled" => Ok(Self::Canceled),
            other => Err(DomainError::Validation(format!(
                "unknown booking status: {other}"
            ))),
        }
    }
}

/// A seat for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Ticket identifier.
    pub ticket_id: Uuid,
    /// Event the ticket belongs to.
    pub event_id: Uuid,
    /// Human-readable seat label.
    pub seat_number: String,
    /// Face value.
    pub price: Decimal,
    /// Durable status.
    pub status: TicketStatus,
    /// Booking that bought the ticket, once sold.
    pub booking_id: Option<Uuid>,
}

/// A reservation as persisted in the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Booking identifier.
    pub booking_id: Uuid,
    /// Buyer.
    pub user_id: Uuid,
    /// Tickets covered by the booking.
    pub ticket_ids: Vec<Uuid>,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Creation time.
    pub booking_date: DateTime<Utc>,
    /// Sum of the ticket prices at creation time.
    pub total_amount: Decimal,
    /// Deterministic hash of the user and the sorted ticket ids.
    pub booking_reference: String,
}

/// Values for inserting a new `Pending` booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Booking identifier chosen by the engine.
    pub booking_id: Uuid,
    /// Buyer.
    pub user_id: Uuid,
    /// Tickets covered by the booking.
    pub ticket_ids: Vec<Uuid>,
    /// Creation time.
    pub booking_date: DateTime<Utc>,
    /// Sum of the ticket prices.
    pub total_amount: Decimal,
    /// Duplicate-submission guard.
    pub booking_reference: String,
}

impl NewBooking {
    /// Materializes the row as it reads back right after insertion.
    #[must_use]
    pub fn into_pending(self) -> Booking {
        Booking {
            booking_id: self.booking_id,
            user_id: self.user_id,
            ticket_ids: self.ticket_ids,
            status: BookingStatus::Pending,
            booking_date: self.booking_date,
            total_amount: self.total_amount,
            booking_reference: self.booking_reference,
        }
    }
}

/// The event a ticket belongs to, with its demand flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Event identifier.
    pub event_id: Uuid,
    /// Whether the event runs an admission queue.
    pub high_demand: bool,
}
