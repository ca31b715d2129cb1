//! Real-time channel port for admission queue members.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Name of the message a queue member receives about their own standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandingEvent {
    /// The user is waiting behind others.
    #[serde(rename = "joined-queue")]
    JoinedQueue,
    /// The user is at the front and may start booking.
    #[serde(rename = "proceed-to-booking")]
    ProceedToBooking,
}

/// A user's place in an event's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStanding {
    /// Joined or proceed.
    pub event: StandingEvent,
    /// 1-based position.
    pub position: u64,
    /// Event the queue belongs to.
    pub event_id: Uuid,
    /// Queue member.
    pub user_id: Uuid,
}

impl QueueStanding {
    /// Standing for a user at `position`; position 1 means proceed.
    #[must_use]
    pub fn at(position: u64, event_id: Uuid, user_id: Uuid) -> Self {
        let event = if position <= 1 {
            StandingEvent::ProceedToBooking
        } else {
            StandingEvent::JoinedQueue
        };
        Self {
            event,
            position,
            event_id,
            user_id,
        }
    }

    /// Standing for the user just admitted from the front.
    #[must_use]
    pub fn proceed(event_id: Uuid, user_id: Uuid) -> Self {
        Self::at(1, event_id, user_id)
    }
}

/// Broadcast to every member of an event's channel when the line moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    /// Human-readable notice.
    pub message: String,
    /// How many places every member advanced.
    pub moved_by: u64,
}

impl PositionUpdate {
    /// The generic "line advanced by one" update.
    #[must_use]
    pub fn advanced() -> Self {
        Self {
            message: "queue position advanced".to_owned(),
            moved_by: 1,
        }
    }
}

/// Delivers queue messages to connected clients.
///
/// Implementations fan out to whichever connections are registered for an
/// event; members that are not connected are skipped silently.
#[async_trait]
pub trait QueueChannels: Send + Sync {
    /// Removes `user_id` from the event's channel and closes its connection.
    async fn disconnect(&self, event_id: Uuid, user_id: Uuid) -> Result<(), DomainError>;

    /// Sends `update` to every member of the event's channel.
    async fn broadcast(&self, event_id: Uuid, update: &PositionUpdate) -> Result<(), DomainError>;

    /// Sends `standing` to one member.
    async fn notify(&self, event_id: Uuid, standing: &QueueStanding) -> Result<(), DomainError>;
}

/// One channel delivery, in the form instances exchange over a relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ChannelMessage {
    /// See [`QueueChannels::disconnect`].
    Disconnect {
        /// Event channel.
        event_id: Uuid,
        /// Member to release.
        user_id: Uuid,
    },
    /// See [`QueueChannels::broadcast`].
    Broadcast {
        /// Event channel.
        event_id: Uuid,
        /// Update for every member.
        update: PositionUpdate,
    },
    /// See [`QueueChannels::notify`].
    Notify {
        /// Event channel.
        event_id: Uuid,
        /// Standing for one member.
        standing: QueueStanding,
    },
}

impl ChannelMessage {
    /// Event whose channel the message addresses.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        match self {
            Self::Disconnect { event_id, .. }
            | Self::Broadcast { event_id, .. }
            | Self::Notify { event_id, .. } => *event_id,
        }
    }

    /// Hands the message to `channels`.
    ///
    /// # Errors
    ///
    /// Returns whatever `channels` returns.
    pub async fn deliver(&self, channels: &dyn QueueChannels) -> Result<(), DomainError> {
        match self {
            Self::Disconnect { event_id, user_id } => channels.disconnect(*event_id, *user_id).await,
            Self::Broadcast { event_id, update } => channels.broadcast(*event_id, update).await,
            Self::Notify { event_id, standing } => channels.notify(*event_id, standing).await,
        }
    }
}

/// Carries channel messages to every instance, including the sender.
///
/// Each instance subscribes and delivers what it hears to its own
/// connections, so a member is reached wherever its socket landed.
#[async_trait]
pub trait ChannelRelay: Send + Sync {
    /// Publishes `message` to all subscribed instances.
    async fn publish(&self, message: &ChannelMessage) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_one_means_proceed() {
        let standing = QueueStanding::at(1, Uuid::nil(), Uuid::nil());
        assert_eq!(standing.event, StandingEvent::ProceedToBooking);

        let waiting = QueueStanding::at(4, Uuid::nil(), Uuid::nil());
        assert_eq!(waiting.event, StandingEvent::JoinedQueue);
    }

    #[test]
    fn test_standing_serializes_wire_names() {
        let standing = QueueStanding::proceed(Uuid::nil(), Uuid::nil());

        let json = serde_json::to_value(standing).unwrap();

        assert_eq!(json["event"], "proceed-to-booking");
        assert_eq!(json["position"], 1);
        assert!(json.get("eventId").is_some());
        assert!(json.get("userId").is_some());
    }

    #[test]
    fn test_channel_message_is_tagged_by_kind() {
        let event_id = Uuid::new_v4();
        let message = ChannelMessage::Notify {
            event_id,
            standing: QueueStanding::at(3, event_id, Uuid::nil()),
        };

        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["kind"], "notify");
        assert_eq!(json["eventId"], event_id.to_string());
        assert_eq!(json["standing"]["position"], 3);
        let back: ChannelMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_id(), event_id);
    }

    #[test]
    fn test_position_update_uses_moved_by_field() {
        let json = serde_json::to_value(PositionUpdate::advanced()).unwrap();
        assert_eq!(json["movedBy"], 1);
    }
}
