//! Admission Controller settings.

use std::time::Duration;

/// Tunables for the admission handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionSettings {
    /// Lifetime of an idempotency marker.
    pub idempotency_ttl: Duration,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            idempotency_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}
