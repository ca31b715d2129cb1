//! Commands for the Reservation Engine.

use turnstile_core::command::Command;
use uuid::Uuid;

/// Command to soft-lock tickets and record a pending booking.
#[derive(Debug, Clone)]
pub struct CreateReservation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Buyer.
    pub user_id: Uuid,
    /// Tickets to reserve.
    pub ticket_ids: Vec<Uuid>,
}

impl Command for CreateReservation {
    fn command_type(&self) -> &'static str {
        "reservation.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to sell the tickets of a pending booking.
#[derive(Debug, Clone)]
pub struct ConfirmReservation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Booking to confirm.
    pub booking_id: Uuid,
}

impl Command for ConfirmReservation {
    fn command_type(&self) -> &'static str {
        "reservation.confirm"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to cancel a pending booking whose locks are known to have lapsed.
#[derive(Debug, Clone)]
pub struct ExpireReservation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Booking to cancel.
    pub booking_id: Uuid,
}

impl Command for ExpireReservation {
    fn command_type(&self) -> &'static str {
        "reservation.expire"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
