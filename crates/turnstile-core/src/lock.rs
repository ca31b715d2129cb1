//! Soft-lock store abstraction.
//!
//! Soft locks are advisory, TTL-bound exclusivity markers on tickets. The
//! absence of a lock means the ticket is contestable again, whether the lock
//! was released explicitly or simply expired. Reservation projections live in
//! the same store with the same TTL as the locks they mirror.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// A live soft lock on a single ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketLock {
    /// Locked ticket.
    pub ticket_id: Uuid,
    /// Owner of the lock.
    pub user_id: Uuid,
    /// When the store will drop the lock.
    pub expires_at: DateTime<Utc>,
}

/// Cached view of a reservation, keyed by booking id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationProjection {
    /// Booking this projection mirrors.
    pub booking_id: Uuid,
    /// Buyer.
    pub user_id: Uuid,
    /// Tickets held by the reservation.
    pub ticket_ids: Vec<Uuid>,
}

/// Result of a batch lock-presence check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Availability {
    /// `true` iff none of the requested tickets has a live lock.
    pub available: bool,
    /// Requested tickets that currently hold a live lock.
    pub blocked_ids: Vec<Uuid>,
}

impl Availability {
    /// Builds the result from the list of locked ids.
    #[must_use]
    pub fn from_blocked(blocked_ids: Vec<Uuid>) -> Self {
        Self {
            available: blocked_ids.is_empty(),
            blocked_ids,
        }
    }
}

/// Result of a batch lock-absence check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expiry {
    /// `true` iff at least one requested ticket has no live lock.
    pub expired: bool,
    /// Requested tickets whose lock is gone.
    pub expired_ids: Vec<Uuid>,
}

impl Expiry {
    /// Builds the result from the list of lapsed ids.
    #[must_use]
    pub fn from_expired(expired_ids: Vec<Uuid>) -> Self {
        Self {
            expired: !expired_ids.is_empty(),
            expired_ids,
        }
    }
}

/// Batch-oriented soft-lock store.
///
/// Implementations must treat every call as an I/O boundary and never hold an
/// in-process mutex across it. Read failures surface as
/// `DomainError::Infrastructure`.
#[async_trait]
pub trait SoftLockStore: Send + Sync {
    /// Reports which of `ticket_ids` currently hold a live lock.
    async fn are_available(&self, ticket_ids: &[Uuid]) -> Result<Availability, DomainError>;

    /// Writes (or overwrites) a lock for every id, owned by `user_id`.
    async fn lock_all(
        &self,
        ticket_ids: &[Uuid],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), DomainError>;

    /// Refreshes the locks on `ticket_ids` with a new TTL.
    ///
    /// Same write semantics as [`SoftLockStore::lock_all`]. The existing owner
    /// is not re-verified.
    async fn increase_lock_time(
        &self,
        ticket_ids: &[Uuid],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), DomainError>;

    /// Reports which of `ticket_ids` no longer hold a lock.
    async fn are_expired(&self, ticket_ids: &[Uuid]) -> Result<Expiry, DomainError>;

    /// Unconditionally deletes the locks. Safe to call on absent locks.
    async fn release_lock(&self, ticket_ids: &[Uuid]) -> Result<(), DomainError>;

    /// Stores the reservation projection with the given TTL.
    async fn set_reservation(
        &self,
        projection: &ReservationProjection,
        ttl: Duration,
    ) -> Result<(), DomainError>;

    /// Loads a live reservation projection.
    async fn get_reservation(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<ReservationProjection>, DomainError>;
}
