//! Shared application state.

use std::sync::Arc;

use turnstile_core::clock::Clock;
use turnstile_core::lock::SoftLockStore;
use turnstile_core::notification::NotificationPublisher;
use turnstile_core::queue::AdmissionQueueStore;
use turnstile_core::repository::BookingRepository;
use turnstile_reservation::application::settings::ReservationSettings;

use crate::hub::ChannelHub;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for lock deadlines, booking dates and queue scores.
    pub clock: Arc<dyn Clock>,
    /// Soft locks and reservation projections.
    pub locks: Arc<dyn SoftLockStore>,
    /// Durable bookings and tickets.
    pub bookings: Arc<dyn BookingRepository>,
    /// Per-event admission queues.
    pub queue: Arc<dyn AdmissionQueueStore>,
    /// Outbound reservation notifications.
    pub publisher: Arc<dyn NotificationPublisher>,
    /// Open queue WebSockets on this instance.
    pub hub: Arc<ChannelHub>,
    /// Reservation lock lifetimes.
    pub reservation: ReservationSettings,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        locks: Arc<dyn SoftLockStore>,
        bookings: Arc<dyn BookingRepository>,
        queue: Arc<dyn AdmissionQueueStore>,
        publisher: Arc<dyn NotificationPublisher>,
        hub: Arc<ChannelHub>,
        reservation: ReservationSettings,
    ) -> Self {
        Self {
            clock,
            locks,
            bookings,
            queue,
            publisher,
            hub,
            reservation,
        }
    }
}
