//! Command handlers for the Admission Controller.

use tracing::{info, instrument, warn};
use turnstile_core::clock::Clock;
use turnstile_core::error::DomainError;
use turnstile_core::guard::IdempotencyGuard;
use turnstile_core::queue::AdmissionQueueStore;
use turnstile_core::realtime::QueueStanding;
use uuid::Uuid;

use crate::application::settings::AdmissionSettings;
use crate::domain::commands::{DequeueNext, JoinQueue};
use crate::domain::outcome::DequeueOutcome;

/// Handles the `JoinQueue` command: scores the user by the current time in
/// milliseconds and reports their 1-based position.
///
/// A user already waiting keeps their original place: the member is added
/// with `ZADD NX` semantics, so a rejoin leaves the first score in place
/// instead of rescoring the user with the current time. Reconnecting never
/// sends a waiting user to the back of the line.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the queue store fails.
#[instrument(
    skip_all,
    fields(correlation_id = %command.correlation_id, event_id = %command.event_id, user_id = %command.user_id)
)]
pub async fn handle_join_queue(
    command: &JoinQueue,
    clock: &dyn Clock,
    queue: &dyn AdmissionQueueStore,
) -> Result<QueueStanding, DomainError> {
    queue
        .add(command.event_id, command.user_id, clock.now_millis())
        .await?;
    let rank = queue
        .rank(command.event_id, command.user_id)
        .await?
        .ok_or_else(|| {
            DomainError::Infrastructure(format!(
                "user {} missing from queue right after enqueue",
                command.user_id
            ))
        })?;

    let position = rank + 1;
    info!(position, "user joined queue");
    Ok(QueueStanding::at(position, command.event_id, command.user_id))
}

/// Handles the `DequeueNext` command: removes and returns the user at the
/// front of the line, or `None` if nobody is waiting.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the queue store fails.
#[instrument(
    skip_all,
    fields(correlation_id = %command.correlation_id, event_id = %command.event_id)
)]
pub async fn handle_dequeue(
    command: &DequeueNext,
    queue: &dyn AdmissionQueueStore,
) -> Result<Option<Uuid>, DomainError> {
    let next = queue.pop_min(command.event_id).await?;
    match next {
        Some(user_id) => info!(%user_id, "user admitted"),
        None => info!("queue empty"),
    }
    Ok(next)
}

/// Runs [`handle_dequeue`] at most once per `idempotency_key`.
///
/// The guard is checked before and marked after the dequeue. If marking
/// fails the dequeue still counts; the failure is logged.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the guard cannot be read or the
/// queue store fails.
#[instrument(skip_all, fields(event_id = %command.event_id, key = idempotency_key))]
pub async fn handle_idempotent_dequeue(
    command: &DequeueNext,
    idempotency_key: &str,
    settings: &AdmissionSettings,
    queue: &dyn AdmissionQueueStore,
    guard: &dyn IdempotencyGuard,
) -> Result<DequeueOutcome, DomainError> {
    if guard.was_executed(idempotency_key).await? {
        info!("dequeue already handled");
        return Ok(DequeueOutcome::AlreadyHandled);
    }

    let next = handle_dequeue(command, queue).await?;

    if let Err(e) = guard
        .mark_executed(idempotency_key, settings.idempotency_ttl)
        .await
    {
        warn!(error = %e, "could not record dequeue marker");
    }
    Ok(DequeueOutcome::Dequeued(next))
}
