//! Test idempotency guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use turnstile_core::clock::Clock;
use turnstile_core::error::DomainError;
use turnstile_core::guard::IdempotencyGuard;

/// An in-memory guard whose markers expire against the injected clock.
pub struct InMemoryIdempotencyGuard {
    clock: Arc<dyn Clock>,
    markers: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryIdempotencyGuard {
    /// Creates a guard with no markers.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            markers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the keys currently marked, live or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn keys(&self) -> Vec<String> {
        self.markers.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl IdempotencyGuard for InMemoryIdempotencyGuard {
    async fn was_executed(&self, key: &str) -> Result<bool, DomainError> {
        let now = self.clock.now();
        Ok(self
            .markers
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|expires_at| *expires_at > now))
    }

    async fn mark_executed(&self, key: &str, ttl: Duration) -> Result<(), DomainError> {
        let expires_at = self.clock.now() + TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self.markers
            .lock()
            .unwrap()
            .insert(key.to_owned(), expires_at);
        Ok(())
    }
}
