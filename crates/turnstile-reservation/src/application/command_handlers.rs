//! Command handlers for the Reservation Engine.
//!
//! Each handler orchestrates one cross-store sequence. No sequence is atomic
//! across stores: the soft-lock store and the relational store are written
//! one after the other, and partial completion is repaired either by an
//! explicit best-effort compensation or by lock TTL expiry.

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use turnstile_core::clock::Clock;
use turnstile_core::error::DomainError;
use turnstile_core::lock::{ReservationProjection, SoftLockStore};
use turnstile_core::model::{Booking, BookingStatus, NewBooking};
use turnstile_core::notification::{NotificationPublisher, ReservationNotification};
use turnstile_core::repository::BookingRepository;
use uuid::Uuid;

use crate::application::settings::ReservationSettings;
use crate::domain::booking::{booking_reference, missing_ids, total_amount, validate_request};
use crate::domain::commands::{ConfirmReservation, CreateReservation, ExpireReservation};

/// Result of a successful `CreateReservation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationReceipt {
    /// The pending booking.
    pub booking_id: Uuid,
    /// Buyer.
    pub user_id: Uuid,
    /// Tickets now soft-locked for the buyer.
    pub ticket_ids: Vec<Uuid>,
}

impl From<&Booking> for ReservationReceipt {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.booking_id,
            user_id: booking.user_id,
            ticket_ids: booking.ticket_ids.clone(),
        }
    }
}

/// Handles the `CreateReservation` command: checks soft locks and durable
/// availability, locks the tickets, then records a pending booking and its
/// projection.
///
/// A retry of a still-live reservation (same user, same ticket set) returns
/// the existing booking instead of creating a second one. This also holds
/// when the retry races the original: the loser's insert is rejected by the
/// pending-reference index and it returns the winner's booking without
/// touching the locks.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed request,
/// `DomainError::UnavailableTicket` when any ticket is locked or not
/// available, and `DomainError::Infrastructure` when a store fails.
#[instrument(
    skip_all,
    fields(
        correlation_id = %command.correlation_id,
        user_id = %command.user_id,
        tickets = command.ticket_ids.len()
    )
)]
pub async fn handle_create_reservation(
    command: &CreateReservation,
    settings: &ReservationSettings,
    clock: &dyn Clock,
    locks: &dyn SoftLockStore,
    repo: &dyn BookingRepository,
) -> Result<ReservationReceipt, DomainError> {
    validate_request(command.user_id, &command.ticket_ids)?;
    let reference = booking_reference(command.user_id, &command.ticket_ids);

    if let Some(existing) = repo.find_pending_by_reference(&reference).await? {
        if locks.get_reservation(existing.booking_id).await?.is_some() {
            info!(booking_id = %existing.booking_id, "returning live reservation for retried request");
            return Ok(ReservationReceipt::from(&existing));
        }
        if repo.cancel_booking(existing.booking_id).await? {
            info!(booking_id = %existing.booking_id, "canceled stale pending booking");
        }
    }

    let availability = locks.are_available(&command.ticket_ids).await?;
    if !availability.available {
        if let Some(winner) = pending_with_reference(&reference, None, repo).await {
            info!(booking_id = %winner.booking_id, "resolved concurrent retry to existing reservation");
            return Ok(ReservationReceipt::from(&winner));
        }
        info!(blocked = ?availability.blocked_ids, "tickets are soft-locked");
        return Err(DomainError::UnavailableTicket {
            ticket_ids: availability.blocked_ids,
        });
    }

    let tickets = repo.find_available_tickets(&command.ticket_ids).await?;
    let missing = missing_ids(&command.ticket_ids, &tickets);
    if !missing.is_empty() {
        info!(missing = ?missing, "tickets are not available");
        return Err(DomainError::UnavailableTicket {
            ticket_ids: missing,
        });
    }

    let new_booking = NewBooking {
        booking_id: Uuid::new_v4(),
        user_id: command.user_id,
        ticket_ids: command.ticket_ids.clone(),
        booking_date: clock.now(),
        total_amount: total_amount(&tickets),
        booking_reference: reference,
    };

    match lock_and_record(&new_booking, settings, locks, repo).await {
        Ok(booking) => {
            info!(booking_id = %booking.booking_id, total = %booking.total_amount, "reservation created");
            Ok(ReservationReceipt::from(&booking))
        }
        Err(e @ DomainError::UnavailableTicket { .. }) => {
            // The pending-reference index rejected the insert: an identical
            // request won the race and its booking owns these locks now.
            if let Some(winner) = pending_with_reference(
                &new_booking.booking_reference,
                Some(new_booking.booking_id),
                repo,
            )
            .await
            {
                info!(booking_id = %winner.booking_id, "resolved concurrent retry to existing reservation");
                return Ok(ReservationReceipt::from(&winner));
            }
            compensate_failed_create(&new_booking, locks, repo).await;
            Err(e)
        }
        Err(e) => {
            compensate_failed_create(&new_booking, locks, repo).await;
            Err(e)
        }
    }
}

/// Pending booking recorded under `reference` by a concurrent identical
/// request, other than `own_booking_id`.
async fn pending_with_reference(
    reference: &str,
    own_booking_id: Option<Uuid>,
    repo: &dyn BookingRepository,
) -> Option<Booking> {
    match repo.find_pending_by_reference(reference).await {
        Ok(found) => found.filter(|b| Some(b.booking_id) != own_booking_id),
        Err(e) => {
            warn!(error = %e, "could not look up concurrent duplicate");
            None
        }
    }
}

async fn lock_and_record(
    new_booking: &NewBooking,
    settings: &ReservationSettings,
    locks: &dyn SoftLockStore,
    repo: &dyn BookingRepository,
) -> Result<Booking, DomainError> {
    locks
        .lock_all(&new_booking.ticket_ids, new_booking.user_id, settings.lock_ttl)
        .await?;
    let booking = repo.insert_booking(new_booking).await?;
    let projection = ReservationProjection {
        booking_id: booking.booking_id,
        user_id: booking.user_id,
        ticket_ids: booking.ticket_ids.clone(),
    };
    locks.set_reservation(&projection, settings.lock_ttl).await?;
    Ok(booking)
}

async fn compensate_failed_create(
    new_booking: &NewBooking,
    locks: &dyn SoftLockStore,
    repo: &dyn BookingRepository,
) {
    if let Err(e) = locks.release_lock(&new_booking.ticket_ids).await {
        warn!(error = %e, "lock release failed; locks will lapse at TTL");
    }
    if let Err(e) = repo.cancel_booking(new_booking.booking_id).await {
        warn!(booking_id = %new_booking.booking_id, error = %e, "could not cancel partially created booking");
    }
}

/// Handles the `ConfirmReservation` command: verifies the reservation is
/// still live, extends its locks, and sells the tickets in one transaction.
///
/// After commit, a `reservation-confirmed` notification is published when the
/// event is high-demand. Publish failures are logged; the sale stands.
///
/// # Errors
///
/// Returns `DomainError::ReservationExpired` (and cancels the booking) when
/// the reservation's locks lapsed, `DomainError::ConfirmationFailed` when the
/// guarded transaction rolled back, and `DomainError::Infrastructure` when a
/// store fails.
#[instrument(
    skip_all,
    fields(correlation_id = %command.correlation_id, booking_id = %command.booking_id)
)]
pub async fn handle_confirm_reservation(
    command: &ConfirmReservation,
    settings: &ReservationSettings,
    clock: &dyn Clock,
    locks: &dyn SoftLockStore,
    repo: &dyn BookingRepository,
    publisher: &dyn NotificationPublisher,
) -> Result<Booking, DomainError> {
    let Some(projection) = locks.get_reservation(command.booking_id).await? else {
        return Err(expire(command.booking_id, None, clock, locks, repo, publisher).await);
    };

    let expiry = locks.are_expired(&projection.ticket_ids).await?;
    if expiry.expired {
        return Err(expire(
            command.booking_id,
            Some(expiry.expired_ids),
            clock,
            locks,
            repo,
            publisher,
        )
        .await);
    }

    locks
        .increase_lock_time(
            &projection.ticket_ids,
            projection.user_id,
            settings.confirm_lock_extension,
        )
        .await?;

    let booking = match repo
        .confirm_booking(command.booking_id, &projection.ticket_ids)
        .await
    {
        Ok(booking) => booking,
        Err(e @ DomainError::ConfirmationFailed(_)) => {
            error!(error = %e, "confirmation transaction rolled back");
            if let Err(cancel_err) = repo.cancel_booking(command.booking_id).await {
                warn!(error = %cancel_err, "could not cancel booking after failed confirmation");
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    info!("reservation confirmed");

    if let Some(&first) = booking.ticket_ids.first() {
        announce(
            ReservationNotification::confirmed,
            first,
            booking.user_id,
            clock,
            repo,
            publisher,
        )
        .await;
    }

    Ok(booking)
}

/// Takes the expiry path for a booking and returns the error to report.
async fn expire(
    booking_id: Uuid,
    lapsed: Option<Vec<Uuid>>,
    clock: &dyn Clock,
    locks: &dyn SoftLockStore,
    repo: &dyn BookingRepository,
    publisher: &dyn NotificationPublisher,
) -> DomainError {
    let booking = match repo.find_booking(booking_id).await {
        Ok(Some(booking)) => booking,
        Ok(None) => {
            info!("no reservation projection and no booking row");
            return DomainError::ReservationExpired {
                ticket_ids: lapsed.unwrap_or_default(),
            };
        }
        Err(e) => return e,
    };

    if booking.status == BookingStatus::Confirmed {
        return DomainError::ConfirmationFailed(format!(
            "booking {booking_id} is already confirmed"
        ));
    }

    let lapsed = match lapsed {
        Some(ids) => ids,
        None => match locks.are_expired(&booking.ticket_ids).await {
            Ok(expiry) if expiry.expired => expiry.expired_ids,
            Ok(_) => booking.ticket_ids.clone(),
            Err(e) => return e,
        },
    };

    match repo.cancel_booking(booking_id).await {
        Ok(true) => {
            info!(lapsed = ?lapsed, "reservation expired; booking canceled");
            if let Some(&first) = booking.ticket_ids.first() {
                announce(
                    ReservationNotification::expired,
                    first,
                    booking.user_id,
                    clock,
                    repo,
                    publisher,
                )
                .await;
            }
        }
        Ok(false) => info!("booking already terminal"),
        Err(e) => warn!(error = %e, "could not cancel expired booking"),
    }

    DomainError::ReservationExpired { ticket_ids: lapsed }
}

/// Publishes a notification for the event of `ticket_id` if it is
/// high-demand. Failures are logged.
async fn announce(
    build: fn(Uuid, Uuid, chrono::DateTime<chrono::Utc>) -> ReservationNotification,
    ticket_id: Uuid,
    user_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn BookingRepository,
    publisher: &dyn NotificationPublisher,
) {
    let event = match repo.find_event_for_ticket(ticket_id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            warn!(%ticket_id, "ticket has no event; skipping notification");
            return;
        }
        Err(e) => {
            warn!(error = %e, "event lookup failed; skipping notification");
            return;
        }
    };
    if !event.high_demand {
        return;
    }

    let notification = build(event.event_id, user_id, clock.now());
    if let Err(e) = publisher.publish(&notification).await {
        error!(
            event_id = %event.event_id,
            kind = %notification.kind,
            error = %e,
            "failed to publish reservation notification"
        );
    }
}

/// Handles the `ExpireReservation` command: cancels a pending booking.
///
/// Returns whether a booking changed. A missing or already terminal booking
/// is a no-op.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the relational store fails.
#[instrument(
    skip_all,
    fields(correlation_id = %command.correlation_id, booking_id = %command.booking_id)
)]
pub async fn handle_reservation_expired(
    command: &ExpireReservation,
    repo: &dyn BookingRepository,
) -> Result<bool, DomainError> {
    let canceled = repo.cancel_booking(command.booking_id).await?;
    if canceled {
        info!("pending booking canceled after expiry");
    } else {
        info!("no pending booking to cancel");
    }
    Ok(canceled)
}
