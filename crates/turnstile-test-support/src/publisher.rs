//! Test notification publisher.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use turnstile_core::error::DomainError;
use turnstile_core::notification::{NotificationPublisher, ReservationNotification};

/// A publisher that records every notification it is handed.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<ReservationNotification>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    /// Creates a publisher with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `publish` fail without recording.
    pub fn fail_publishes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Returns a snapshot of the notifications published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<ReservationNotification> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, notification: &ReservationNotification) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("publish timed out".into()));
        }
        self.published.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
