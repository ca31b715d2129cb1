//! Redis implementation of the `IdempotencyGuard` trait.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use turnstile_core::error::DomainError;
use turnstile_core::guard::IdempotencyGuard;

use crate::{redis_error, ttl_millis};

const COMPLETED: &str = "completed";

/// Redis-backed idempotency guard. Markers are plain keys with a TTL.
#[derive(Clone)]
pub struct RedisIdempotencyGuard {
    conn_manager: ConnectionManager,
}

impl RedisIdempotencyGuard {
    /// Wraps an existing connection manager.
    #[must_use]
    pub fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

#[async_trait]
impl IdempotencyGuard for RedisIdempotencyGuard {
    async fn was_executed(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.conn_manager.clone();
        redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to read idempotency marker", &e))
    }

    async fn mark_executed(&self, key: &str, ttl: Duration) -> Result<(), DomainError> {
        let mut conn = self.conn_manager.clone();
        let (): () = redis::cmd("SET")
            .arg(key)
            .arg(COMPLETED)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to write idempotency marker", &e))?;
        Ok(())
    }
}
