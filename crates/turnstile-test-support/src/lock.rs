//! Test soft-lock stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use turnstile_core::clock::Clock;
use turnstile_core::error::DomainError;
use turnstile_core::lock::{
    Availability, Expiry, ReservationProjection, SoftLockStore, TicketLock,
};
use uuid::Uuid;

fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now + TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}

/// An in-memory soft-lock store. Entries vanish once the injected clock
/// passes their expiry, mirroring a key-value store with per-key TTL.
pub struct InMemorySoftLockStore {
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<Uuid, TicketLock>>,
    reservations: Mutex<HashMap<Uuid, (ReservationProjection, DateTime<Utc>)>>,
    fail_releases: AtomicBool,
}

impl InMemorySoftLockStore {
    /// Creates an empty store measuring TTLs against `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            locks: Mutex::new(HashMap::new()),
            reservations: Mutex::new(HashMap::new()),
            fail_releases: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `release_lock` call fail.
    pub fn fail_releases(&self) {
        self.fail_releases.store(true, Ordering::SeqCst);
    }

    /// Returns the live lock on `ticket_id`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn lock_for(&self, ticket_id: Uuid) -> Option<TicketLock> {
        let now = self.clock.now();
        self.locks
            .lock()
            .unwrap()
            .get(&ticket_id)
            .filter(|lock| lock.expires_at > now)
            .cloned()
    }

    /// Drops the reservation projection as if its TTL had elapsed, leaving
    /// the ticket locks in place.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn evict_reservation(&self, booking_id: Uuid) {
        self.reservations.lock().unwrap().remove(&booking_id);
    }

    fn write_locks(&self, ticket_ids: &[Uuid], user_id: Uuid, ttl: Duration) {
        let expires_at = expiry_after(self.clock.now(), ttl);
        let mut locks = self.locks.lock().unwrap();
        for &ticket_id in ticket_ids {
            locks.insert(
                ticket_id,
                TicketLock {
                    ticket_id,
                    user_id,
                    expires_at,
                },
            );
        }
    }

    fn live_ids(&self, ticket_ids: &[Uuid]) -> Vec<Uuid> {
        let now = self.clock.now();
        let locks = self.locks.lock().unwrap();
        ticket_ids
            .iter()
            .copied()
            .filter(|id| locks.get(id).is_some_and(|lock| lock.expires_at > now))
            .collect()
    }
}

#[async_trait]
impl SoftLockStore for InMemorySoftLockStore {
    async fn are_available(&self, ticket_ids: &[Uuid]) -> Result<Availability, DomainError> {
        Ok(Availability::from_blocked(self.live_ids(ticket_ids)))
    }

    async fn lock_all(
        &self,
        ticket_ids: &[Uuid],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        self.write_locks(ticket_ids, user_id, ttl);
        Ok(())
    }

    async fn increase_lock_time(
        &self,
        ticket_ids: &[Uuid],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        self.write_locks(ticket_ids, user_id, ttl);
        Ok(())
    }

    async fn are_expired(&self, ticket_ids: &[Uuid]) -> Result<Expiry, DomainError> {
        let live = self.live_ids(ticket_ids);
        let expired = ticket_ids
            .iter()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        Ok(Expiry::from_expired(expired))
    }

    async fn release_lock(&self, ticket_ids: &[Uuid]) -> Result<(), DomainError> {
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("connection refused".into()));
        }
        let mut locks = self.locks.lock().unwrap();
        for id in ticket_ids {
            locks.remove(id);
        }
        Ok(())
    }

    async fn set_reservation(
        &self,
        projection: &ReservationProjection,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let expires_at = expiry_after(self.clock.now(), ttl);
        self.reservations
            .lock()
            .unwrap()
            .insert(projection.booking_id, (projection.clone(), expires_at));
        Ok(())
    }

    async fn get_reservation(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<ReservationProjection>, DomainError> {
        let now = self.clock.now();
        Ok(self
            .reservations
            .lock()
            .unwrap()
            .get(&booking_id)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(projection, _)| projection.clone()))
    }
}

/// A soft-lock store that always returns an infrastructure error. Useful for
/// testing transient-failure paths.
#[derive(Debug)]
pub struct FailingSoftLockStore;

#[async_trait]
impl SoftLockStore for FailingSoftLockStore {
    async fn are_available(&self, _ticket_ids: &[Uuid]) -> Result<Availability, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn lock_all(
        &self,
        _ticket_ids: &[Uuid],
        _user_id: Uuid,
        _ttl: Duration,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn increase_lock_time(
        &self,
        _ticket_ids: &[Uuid],
        _user_id: Uuid,
        _ttl: Duration,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn are_expired(&self, _ticket_ids: &[Uuid]) -> Result<Expiry, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn release_lock(&self, _ticket_ids: &[Uuid]) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn set_reservation(
        &self,
        _projection: &ReservationProjection,
        _ttl: Duration,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn get_reservation(
        &self,
        _booking_id: Uuid,
    ) -> Result<Option<ReservationProjection>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
