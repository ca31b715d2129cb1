//! Redis implementation of the `AdmissionQueueStore` trait.
//!
//! Each event's queue is a sorted set keyed `event-queue:{event_id}` whose
//! members are user ids scored by enqueue time in milliseconds.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::instrument;
use uuid::Uuid;

use turnstile_core::error::DomainError;
use turnstile_core::queue::AdmissionQueueStore;

use crate::redis_error;
use crate::schema::event_queue_key;

/// Redis-backed admission queue store.
#[derive(Clone)]
pub struct RedisAdmissionQueue {
    conn_manager: ConnectionManager,
}

impl RedisAdmissionQueue {
    /// Wraps an existing connection manager.
    #[must_use]
    pub fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

#[async_trait]
impl AdmissionQueueStore for RedisAdmissionQueue {
    #[instrument(skip(self))]
    async fn add(&self, event_id: Uuid, user_id: Uuid, score: i64) -> Result<(), DomainError> {
        let mut conn = self.conn_manager.clone();
        let _: i64 = redis::cmd("ZADD")
            .arg(event_queue_key(event_id))
            .arg("NX")
            .arg(score)
            .arg(user_id.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to enqueue user", &e))?;
        Ok(())
    }

    async fn rank(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<u64>, DomainError> {
        let mut conn = self.conn_manager.clone();
        redis::cmd("ZRANK")
            .arg(event_queue_key(event_id))
            .arg(user_id.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to read queue rank", &e))
    }

    #[instrument(skip(self))]
    async fn pop_min(&self, event_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        let mut conn = self.conn_manager.clone();
        // Reply is [member, score] or empty.
        let reply: Vec<String> = redis::cmd("ZPOPMIN")
            .arg(event_queue_key(event_id))
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to dequeue user", &e))?;

        reply
            .first()
            .map(|member| {
                Uuid::parse_str(member).map_err(|e| {
                    DomainError::Infrastructure(format!("corrupt queue member {member}: {e}"))
                })
            })
            .transpose()
    }

    async fn len(&self, event_id: Uuid) -> Result<u64, DomainError> {
        let mut conn = self.conn_manager.clone();
        redis::cmd("ZCARD")
            .arg(event_queue_key(event_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to read queue length", &e))
    }
}
