//! Reservation Engine settings.

use std::time::Duration;

/// Tunables shared by the reservation command handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationSettings {
    /// Lifetime of the soft locks and the reservation projection.
    pub lock_ttl: Duration,
    /// TTL written over the locks right before the confirm transaction.
    pub confirm_lock_extension: Duration,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(600),
            confirm_lock_extension: Duration::from_secs(60),
        }
    }
}
