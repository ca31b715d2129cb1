//! `PostgreSQL` implementation of the `BookingRepository` trait.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use turnstile_core::error::DomainError;
use turnstile_core::model::{Booking, EventSummary, NewBooking, Ticket};
use turnstile_core::repository::BookingRepository;

const BOOKING_COLUMNS: &str =
    "booking_id, user_id, ticket_ids, status, booking_date, total_amount, booking_reference";
const TICKET_COLUMNS: &str = "ticket_id, event_id, seat_number, price, status, booking_id";

/// PostgreSQL-backed booking repository.
#[derive(Debug, Clone)]
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    /// Creates a new `PgBookingRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(e: &sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {e}"))
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, DomainError> {
    let status: String = row.try_get("status").map_err(|e| db_error(&e))?;
    Ok(Ticket {
        ticket_id: row.try_get("ticket_id").map_err(|e| db_error(&e))?,
        event_id: row.try_get("event_id").map_err(|e| db_error(&e))?,
        seat_number: row.try_get("seat_number").map_err(|e| db_error(&e))?,
        price: row.try_get("price").map_err(|e| db_error(&e))?,
        status: status.parse()?,
        booking_id: row.try_get("booking_id").map_err(|e| db_error(&e))?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, DomainError> {
    let status: String = row.try_get("status").map_err(|e| db_error(&e))?;
    Ok(Booking {
        booking_id: row.try_get("booking_id").map_err(|e| db_error(&e))?,
        user_id: row.try_get("user_id").map_err(|e| db_error(&e))?,
        ticket_ids: row.try_get("ticket_ids").map_err(|e| db_error(&e))?,
        status: status.parse()?,
        booking_date: row.try_get("booking_date").map_err(|e| db_error(&e))?,
        total_amount: row.try_get("total_amount").map_err(|e| db_error(&e))?,
        booking_reference: row.try_get("booking_reference").map_err(|e| db_error(&e))?,
    })
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    #[instrument(skip(self), fields(count = ticket_ids.len()))]
    async fn find_available_tickets(&self, ticket_ids: &[Uuid]) -> Result<Vec<Ticket>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE ticket_id = ANY($1) AND status = 'Available'"
        ))
        .bind(ticket_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        rows.iter().map(ticket_from_row).collect()
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.booking_id))]
    async fn insert_booking(&self, booking: &NewBooking) -> Result<Booking, DomainError> {
        let result = sqlx::query(&format!(
            "INSERT INTO bookings \
             (booking_id, user_id, ticket_ids, status, booking_date, total_amount, booking_reference) \
             VALUES ($1, $2, $3, 'Pending', $4, $5, $6) \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.booking_id)
        .bind(booking.user_id)
        .bind(&booking.ticket_ids)
        .bind(booking.booking_date)
        .bind(booking.total_amount)
        .bind(&booking.booking_reference)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => booking_from_row(&row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(reference = %booking.booking_reference, "duplicate pending booking");
                Err(DomainError::UnavailableTicket {
                    ticket_ids: booking.ticket_ids.clone(),
                })
            }
            Err(e) => Err(db_error(&e)),
        }
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn find_pending_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE booking_reference = $1 AND status = 'Pending'"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        row.as_ref().map(booking_from_row).transpose()
    }

    #[instrument(skip(self, ticket_ids), fields(count = ticket_ids.len()))]
    async fn confirm_booking(
        &self,
        booking_id: Uuid,
        ticket_ids: &[Uuid],
    ) -> Result<Booking, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error(&e))?;

        let sold = sqlx::query(
            "UPDATE tickets SET status = 'Sold', booking_id = $1 \
             WHERE ticket_id IN ( \
                 SELECT ticket_id FROM tickets \
                 WHERE ticket_id = ANY($2) AND status <> 'Sold' \
                 FOR UPDATE \
             )",
        )
        .bind(booking_id)
        .bind(ticket_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error(&e))?
        .rows_affected();

        let expected = u64::try_from(ticket_ids.len()).unwrap_or(u64::MAX);
        if sold != expected {
            tx.rollback().await.map_err(|e| db_error(&e))?;
            warn!(sold, expected, "ticket update affected the wrong number of rows");
            return Err(DomainError::ConfirmationFailed(format!(
                "expected {expected} tickets to be sold, updated {sold}"
            )));
        }

        let row = sqlx::query(&format!(
            "UPDATE bookings SET status = 'Confirmed' \
             WHERE booking_id = $1 AND status = 'Pending' \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error(&e))?;

        let Some(row) = row else {
            tx.rollback().await.map_err(|e| db_error(&e))?;
            warn!("booking update affected no rows");
            return Err(DomainError::ConfirmationFailed(format!(
                "booking {booking_id} is not pending"
            )));
        };
        let booking = booking_from_row(&row)?;

        tx.commit().await.map_err(|e| db_error(&e))?;
        Ok(booking)
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'Canceled' \
             WHERE booking_id = $1 AND status = 'Pending'",
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_event_for_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<EventSummary>, DomainError> {
        let row = sqlx::query(
            "SELECT e.event_id, e.is_high_demand FROM tickets t \
             JOIN events e ON e.event_id = t.event_id \
             WHERE t.ticket_id = $1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        row.map(|row| {
            Ok(EventSummary {
                event_id: row.try_get("event_id").map_err(|e| db_error(&e))?,
                high_demand: row.try_get("is_high_demand").map_err(|e| db_error(&e))?,
            })
        })
        .transpose()
    }

    async fn list_event_tickets(&self, event_id: Uuid) -> Result<Vec<Ticket>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE event_id = $1 ORDER BY seat_number"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        rows.iter().map(ticket_from_row).collect()
    }
}
