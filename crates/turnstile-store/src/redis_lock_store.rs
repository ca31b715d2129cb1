//! Redis implementation of the `SoftLockStore` trait.
//!
//! Each ticket lock is a string key holding the JSON-encoded [`TicketLock`]
//! with a millisecond TTL. A lock is live exactly as long as its key exists.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{debug, instrument};
use uuid::Uuid;

use turnstile_core::clock::Clock;
use turnstile_core::error::DomainError;
use turnstile_core::lock::{
    Availability, Expiry, ReservationProjection, SoftLockStore, TicketLock,
};

use crate::schema::{reservation_key, ticket_lock_key};
use crate::{redis_error, ttl_millis};

/// Redis-backed soft-lock store.
#[derive(Clone)]
pub struct RedisSoftLockStore {
    conn_manager: ConnectionManager,
    clock: Arc<dyn Clock>,
}

impl RedisSoftLockStore {
    /// Wraps an existing connection manager.
    #[must_use]
    pub fn new(conn_manager: ConnectionManager, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn_manager,
            clock,
        }
    }

    /// Connects to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the client cannot be created
    /// or the first connection fails.
    pub async fn connect(redis_url: &str, clock: Arc<dyn Clock>) -> Result<Self, DomainError> {
        let client =
            Client::open(redis_url).map_err(|e| redis_error("failed to create Redis client", &e))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| redis_error("failed to connect to Redis", &e))?;
        Ok(Self::new(conn_manager, clock))
    }

    /// Reads the lock keys of `ticket_ids`, returning presence per id.
    async fn presence(&self, ticket_ids: &[Uuid]) -> Result<Vec<(Uuid, bool)>, DomainError> {
        if ticket_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn_manager.clone();
        let keys: Vec<String> = ticket_ids.iter().copied().map(ticket_lock_key).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to read ticket locks", &e))?;

        Ok(ticket_ids
            .iter()
            .copied()
            .zip(values.iter().map(Option::is_some))
            .collect())
    }

    async fn write_locks(
        &self,
        ticket_ids: &[Uuid],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        if ticket_ids.is_empty() {
            return Ok(());
        }
        let expires_at = self.clock.now() + TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let ttl_ms = ttl_millis(ttl);

        let mut pipe = redis::pipe();
        pipe.atomic();
        for &ticket_id in ticket_ids {
            let lock = TicketLock {
                ticket_id,
                user_id,
                expires_at,
            };
            let value = serde_json::to_string(&lock).map_err(|e| {
                DomainError::Infrastructure(format!("lock serialization failed: {e}"))
            })?;
            pipe.cmd("SET")
                .arg(ticket_lock_key(ticket_id))
                .arg(value)
                .arg("PX")
                .arg(ttl_ms)
                .ignore();
        }

        let mut conn = self.conn_manager.clone();
        let (): () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to write ticket locks", &e))?;
        debug!(count = ticket_ids.len(), ttl_ms, "ticket locks written");
        Ok(())
    }
}

#[async_trait]
impl SoftLockStore for RedisSoftLockStore {
    #[instrument(skip(self), fields(count = ticket_ids.len()))]
    async fn are_available(&self, ticket_ids: &[Uuid]) -> Result<Availability, DomainError> {
        let blocked = self
            .presence(ticket_ids)
            .await?
            .into_iter()
            .filter_map(|(id, locked)| locked.then_some(id))
            .collect();
        Ok(Availability::from_blocked(blocked))
    }

    #[instrument(skip(self, ticket_ids), fields(count = ticket_ids.len()))]
    async fn lock_all(
        &self,
        ticket_ids: &[Uuid],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        self.write_locks(ticket_ids, user_id, ttl).await
    }

    #[instrument(skip(self, ticket_ids), fields(count = ticket_ids.len()))]
    async fn increase_lock_time(
        &self,
        ticket_ids: &[Uuid],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        self.write_locks(ticket_ids, user_id, ttl).await
    }

    #[instrument(skip(self), fields(count = ticket_ids.len()))]
    async fn are_expired(&self, ticket_ids: &[Uuid]) -> Result<Expiry, DomainError> {
        let expired = self
            .presence(ticket_ids)
            .await?
            .into_iter()
            .filter_map(|(id, locked)| (!locked).then_some(id))
            .collect();
        Ok(Expiry::from_expired(expired))
    }

    async fn release_lock(&self, ticket_ids: &[Uuid]) -> Result<(), DomainError> {
        if ticket_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn_manager.clone();
        let keys: Vec<String> = ticket_ids.iter().copied().map(ticket_lock_key).collect();
        let _: i64 = redis::cmd("DEL")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to release ticket locks", &e))?;
        Ok(())
    }

    async fn set_reservation(
        &self,
        projection: &ReservationProjection,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let value = serde_json::to_string(projection).map_err(|e| {
            DomainError::Infrastructure(format!("projection serialization failed: {e}"))
        })?;
        let mut conn = self.conn_manager.clone();
        let (): () = redis::cmd("SET")
            .arg(reservation_key(projection.booking_id))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to store reservation", &e))?;
        Ok(())
    }

    async fn get_reservation(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<ReservationProjection>, DomainError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(reservation_key(booking_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to read reservation", &e))?;

        value
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    DomainError::Infrastructure(format!("corrupt reservation projection: {e}"))
                })
            })
            .transpose()
    }
}
