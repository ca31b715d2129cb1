//! Admission queue store abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;

/// A per-event ordered set of waiting users, scored by enqueue time.
#[async_trait]
pub trait AdmissionQueueStore: Send + Sync {
    /// Inserts `user_id` with `score` unless the user is already waiting, in
    /// which case the existing score is kept.
    async fn add(&self, event_id: Uuid, user_id: Uuid, score: i64) -> Result<(), DomainError>;

    /// Zero-based rank of `user_id`, or `None` if the user is not waiting.
    async fn rank(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<u64>, DomainError>;

    /// Atomically removes and returns the lowest-scored member.
    ///
    /// Concurrent callers for the same event never observe the same member.
    async fn pop_min(&self, event_id: Uuid) -> Result<Option<Uuid>, DomainError>;

    /// Number of users waiting for `event_id`.
    async fn len(&self, event_id: Uuid) -> Result<u64, DomainError>;
}
