//! Idempotency guard abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DomainError;

/// Records "already processed" markers so replayed work becomes a no-op.
#[async_trait]
pub trait IdempotencyGuard: Send + Sync {
    /// Returns `true` if `key` has been marked completed and not yet expired.
    async fn was_executed(&self, key: &str) -> Result<bool, DomainError>;

    /// Marks `key` completed for `ttl`.
    async fn mark_executed(&self, key: &str, ttl: Duration) -> Result<(), DomainError>;
}
