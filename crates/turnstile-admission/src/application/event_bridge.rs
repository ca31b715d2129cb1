//! Event Bridge: turns reservation notifications into queue movement.
//!
//! A confirmed or expired reservation frees the front slot of its event's
//! line. The bridge dequeues the next user at most once per notification,
//! releases the previous user's channel, tells everyone the line moved, and
//! tells the admitted user to proceed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};
use turnstile_core::error::DomainError;
use turnstile_core::guard::IdempotencyGuard;
use turnstile_core::notification::{
    Acknowledgement, NotificationHandler, RawNotification, ReservationNotification,
};
use turnstile_core::queue::AdmissionQueueStore;
use turnstile_core::realtime::{PositionUpdate, QueueChannels, QueueStanding};
use uuid::Uuid;

use crate::application::command_handlers::handle_idempotent_dequeue;
use crate::application::settings::AdmissionSettings;
use crate::domain::commands::DequeueNext;
use crate::domain::outcome::DequeueOutcome;

/// Handles one delivery of a reservation notification.
///
/// Returns `Nack` for undecodable payloads and transient store failures so
/// the transport redelivers or dead-letters them; everything else, including
/// replays, is acknowledged once the dequeue effect (or its skip) completes.
#[instrument(skip_all, fields(ordering_key = %raw.ordering_key))]
pub async fn handle_notification(
    raw: &RawNotification,
    settings: &AdmissionSettings,
    queue: &dyn AdmissionQueueStore,
    guard: &dyn IdempotencyGuard,
    channels: &dyn QueueChannels,
) -> Acknowledgement {
    let notification = match ReservationNotification::decode(raw) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "rejecting malformed notification");
            return Acknowledgement::Nack;
        }
    };
    let event_id = notification.event_id();
    let previous_user = notification.body.user_id;

    let command = DequeueNext {
        correlation_id: Uuid::new_v4(),
        event_id,
    };
    let outcome = match handle_idempotent_dequeue(
        &command,
        &notification.idempotency_key(),
        settings,
        queue,
        guard,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(%event_id, error = %e, transient = e.is_transient(), "dequeue failed");
            return Acknowledgement::Nack;
        }
    };

    if let DequeueOutcome::Dequeued(next) = outcome {
        info!(%event_id, kind = %notification.kind, admitted = ?next, "queue advanced");
        announce_advance(event_id, previous_user, next, channels).await;
    }
    Acknowledgement::Ack
}

async fn announce_advance(
    event_id: Uuid,
    previous_user: Uuid,
    next: Option<Uuid>,
    channels: &dyn QueueChannels,
) {
    report(
        "disconnect",
        channels.disconnect(event_id, previous_user).await,
    );
    report(
        "broadcast",
        channels
            .broadcast(event_id, &PositionUpdate::advanced())
            .await,
    );
    if let Some(user_id) = next {
        report(
            "notify",
            channels
                .notify(event_id, &QueueStanding::proceed(event_id, user_id))
                .await,
        );
    }
}

fn report(step: &str, result: Result<(), DomainError>) {
    if let Err(e) = result {
        warn!(step, error = %e, "realtime delivery failed");
    }
}

/// [`NotificationHandler`] that owns the stores the bridge needs.
#[derive(Clone)]
pub struct ReservationEventBridge {
    settings: AdmissionSettings,
    queue: Arc<dyn AdmissionQueueStore>,
    guard: Arc<dyn IdempotencyGuard>,
    channels: Arc<dyn QueueChannels>,
}

impl ReservationEventBridge {
    /// Creates a bridge over the given stores and channels.
    #[must_use]
    pub fn new(
        settings: AdmissionSettings,
        queue: Arc<dyn AdmissionQueueStore>,
        guard: Arc<dyn IdempotencyGuard>,
        channels: Arc<dyn QueueChannels>,
    ) -> Self {
        Self {
            settings,
            queue,
            guard,
            channels,
        }
    }
}

#[async_trait]
impl NotificationHandler for ReservationEventBridge {
    async fn handle(&self, raw: &RawNotification) -> Acknowledgement {
        handle_notification(
            raw,
            &self.settings,
            self.queue.as_ref(),
            self.guard.as_ref(),
            self.channels.as_ref(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use turnstile_core::notification::{Acknowledgement, ReservationNotification};
    use turnstile_core::queue::AdmissionQueueStore;
    use turnstile_core::realtime::{PositionUpdate, QueueStanding};
    use uuid::Uuid;

    use super::*;
    use turnstile_test_support::{
        ChannelCall, FailingAdmissionQueue, FixedClock, InMemoryAdmissionQueue,
        InMemoryIdempotencyGuard, RecordingQueueChannels,
    };

    struct Harness {
        queue: InMemoryAdmissionQueue,
        guard: InMemoryIdempotencyGuard,
        channels: RecordingQueueChannels,
        settings: AdmissionSettings,
    }

    fn harness() -> Harness {
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()));
        Harness {
            queue: InMemoryAdmissionQueue::new(),
            guard: InMemoryIdempotencyGuard::new(clock),
            channels: RecordingQueueChannels::new(),
            settings: AdmissionSettings::default(),
        }
    }

    async fn deliver(h: &Harness, raw: &RawNotification) -> Acknowledgement {
        handle_notification(raw, &h.settings, &h.queue, &h.guard, &h.channels).await
    }

    fn confirmed(event_id: Uuid, user_id: Uuid) -> RawNotification {
        ReservationNotification::confirmed(
            event_id,
            user_id,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 5, 0).unwrap(),
        )
        .encode("reservation-engine")
        .unwrap()
    }

    #[tokio::test]
    async fn test_confirmation_admits_next_user_and_notifies_channels() {
        // Arrange
        let h = harness();
        let event_id = Uuid::new_v4();
        let (previous, next) = (Uuid::new_v4(), Uuid::new_v4());
        h.queue.add(event_id, next, 10).await.unwrap();

        // Act
        let ack = deliver(&h, &confirmed(event_id, previous)).await;

        // Assert
        assert_eq!(ack, Acknowledgement::Ack);
        assert_eq!(
            h.channels.calls(),
            vec![
                ChannelCall::Disconnect {
                    event_id,
                    user_id: previous
                },
                ChannelCall::Broadcast {
                    event_id,
                    update: PositionUpdate::advanced()
                },
                ChannelCall::Notify {
                    event_id,
                    standing: QueueStanding::proceed(event_id, next)
                },
            ]
        );
        assert_eq!(h.queue.len(event_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_has_single_effect() {
        // Arrange
        let h = harness();
        let event_id = Uuid::new_v4();
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        h.queue.add(event_id, u1, 1).await.unwrap();
        h.queue.add(event_id, u2, 2).await.unwrap();
        let raw = confirmed(event_id, Uuid::new_v4());

        // Act
        let first = deliver(&h, &raw).await;
        let second = deliver(&h, &raw).await;

        // Assert
        assert_eq!(first, Acknowledgement::Ack);
        assert_eq!(second, Acknowledgement::Ack);
        assert_eq!(h.queue.members(event_id), vec![u2]);
        assert_eq!(h.channels.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_queue_still_broadcasts_without_notify() {
        let h = harness();
        let event_id = Uuid::new_v4();

        let ack = deliver(&h, &confirmed(event_id, Uuid::new_v4())).await;

        assert_eq!(ack, Acknowledgement::Ack);
        let calls = h.channels.calls();
        assert_eq!(calls.len(), 2);
        assert!(
            !calls
                .iter()
                .any(|c| matches!(c, ChannelCall::Notify { .. }))
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_is_nacked_without_side_effects() {
        // Arrange
        let h = harness();
        let event_id = Uuid::new_v4();
        h.queue.add(event_id, Uuid::new_v4(), 1).await.unwrap();
        let mut raw = confirmed(event_id, Uuid::new_v4());
        raw.data = b"{".to_vec();

        // Act
        let ack = deliver(&h, &raw).await;

        // Assert
        assert_eq!(ack, Acknowledgement::Nack);
        assert_eq!(h.queue.len(event_id).await.unwrap(), 1);
        assert!(h.channels.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transient_queue_failure_is_nacked() {
        let h = harness();
        let raw = confirmed(Uuid::new_v4(), Uuid::new_v4());

        let ack = handle_notification(
            &raw,
            &h.settings,
            &FailingAdmissionQueue,
            &h.guard,
            &h.channels,
        )
        .await;

        assert_eq!(ack, Acknowledgement::Nack);
        assert!(h.guard.keys().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_handler_delegates_to_stores() {
        // Arrange
        let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()));
        let queue = Arc::new(InMemoryAdmissionQueue::new());
        let channels = Arc::new(RecordingQueueChannels::new());
        let bridge = ReservationEventBridge::new(
            AdmissionSettings::default(),
            queue.clone(),
            Arc::new(InMemoryIdempotencyGuard::new(clock)),
            channels.clone(),
        );
        let event_id = Uuid::new_v4();
        let next = Uuid::new_v4();
        queue.add(event_id, next, 1).await.unwrap();

        // Act
        let ack = bridge.handle(&confirmed(event_id, Uuid::new_v4())).await;

        // Assert
        assert_eq!(ack, Acknowledgement::Ack);
        assert!(channels.calls().contains(&ChannelCall::Notify {
            event_id,
            standing: QueueStanding::proceed(event_id, next),
        }));
    }
}
