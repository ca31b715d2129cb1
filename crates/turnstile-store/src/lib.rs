//! Storage adapters for the Turnstile ticketing core.
//!
//! `PostgreSQL` holds the durable ticket and booking rows; Redis holds the
//! TTL-bound soft locks, reservation projections, admission queues and
//! idempotency markers, and relays queue channel messages between instances
//! over pub/sub. The notification bus is in-process.

pub mod notification_bus;
pub mod pg_booking_repository;
pub mod redis_channel_relay;
pub mod redis_guard;
pub mod redis_lock_store;
pub mod redis_queue_store;
pub mod schema;

pub(crate) fn redis_error(context: &str, e: &redis::RedisError) -> turnstile_core::error::DomainError {
    turnstile_core::error::DomainError::Infrastructure(format!("{context}: {e}"))
}

pub(crate) fn ttl_millis(ttl: std::time::Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}
