//! Reservation notifications exchanged between the reservation engine and
//! the admission controller.
//!
//! Notifications travel over an at-least-once channel ordered per event id.
//! On the wire a notification is a flat string attribute map plus a JSON body;
//! [`ReservationNotification`] is the typed form on both ends.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::DomainError;

/// Topic the reservation engine publishes to.
pub const RESERVATION_TOPIC: &str = "reservation-events";

const ATTR_EVENT_ID: &str = "eventId";
const ATTR_EVENT_TYPE: &str = "eventType";
const ATTR_CREATED_TIME: &str = "createdTime";
const ATTR_PUBLISHER: &str = "publisher";

/// Why the queue should advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A reservation was confirmed and its buyer leaves the front of the line.
    #[serde(rename = "reservation-confirmed")]
    ReservationConfirmed,
    /// A reservation lapsed and its holder gave up the slot.
    #[serde(rename = "reservation-expired")]
    ReservationExpired,
}

impl NotificationKind {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReservationConfirmed => "reservation-confirmed",
            Self::ReservationExpired => "reservation-expired",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservation-confirmed" => Ok(Self::ReservationConfirmed),
            "reservation-expired" => Ok(Self::ReservationExpired),
            other => Err(DomainError::Validation(format!(
                "unknown notification type: {other}"
            ))),
        }
    }
}

/// JSON body of a reservation notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBody {
    /// User whose reservation was confirmed or expired.
    pub user_id: Uuid,
    /// Event the reservation belongs to.
    pub event_id: Uuid,
}

/// A notification in its untyped transport form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    /// String attributes.
    pub attributes: BTreeMap<String, String>,
    /// Serialized body.
    pub data: Vec<u8>,
    /// Deliveries sharing this key are processed in publish order.
    pub ordering_key: String,
}

/// Typed reservation notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationNotification {
    /// Confirmed or expired.
    pub kind: NotificationKind,
    /// Publish time.
    pub created_time: DateTime<Utc>,
    /// Payload.
    pub body: NotificationBody,
}

impl ReservationNotification {
    /// Builds a `reservation-confirmed` notification.
    #[must_use]
    pub fn confirmed(event_id: Uuid, user_id: Uuid, created_time: DateTime<Utc>) -> Self {
        Self {
            kind: NotificationKind::ReservationConfirmed,
            created_time,
            body: NotificationBody { user_id, event_id },
        }
    }

    /// Builds a `reservation-expired` notification.
    #[must_use]
    pub fn expired(event_id: Uuid, user_id: Uuid, created_time: DateTime<Utc>) -> Self {
        Self {
            kind: NotificationKind::ReservationExpired,
            created_time,
            body: NotificationBody { user_id, event_id },
        }
    }

    /// Event the notification is ordered by.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.body.event_id
    }

    /// Key that every redelivery of this notification shares.
    ///
    /// Derived from the notification's identity (type, event, previous user
    /// and publish time), so two distinct confirmations by the same user never
    /// collide while duplicates always do.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.body.event_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.body.user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(
            self.created_time
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        format!("dequeue:{}", hex::encode(hasher.finalize()))
    }

    /// Encodes into the transport form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the body cannot be serialized.
    pub fn encode(&self, publisher: &str) -> Result<RawNotification, DomainError> {
        let data = serde_json::to_vec(&self.body).map_err(|e| {
            DomainError::Infrastructure(format!("notification serialization failed: {e}"))
        })?;
        let event_id = self.body.event_id.to_string();
        let attributes = BTreeMap::from([
            (ATTR_EVENT_ID.to_owned(), event_id.clone()),
            (ATTR_EVENT_TYPE.to_owned(), self.kind.as_str().to_owned()),
            (
                ATTR_CREATED_TIME.to_owned(),
                self.created_time
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
            ),
            (ATTR_PUBLISHER.to_owned(), publisher.to_owned()),
        ]);
        Ok(RawNotification {
            attributes,
            data,
            ordering_key: event_id,
        })
    }

    /// Parses the transport form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` when an attribute is missing or
    /// malformed, the body is not valid JSON, or the body's event id does not
    /// match the `eventId` attribute.
    pub fn decode(raw: &RawNotification) -> Result<Self, DomainError> {
        let attribute = |name: &str| {
            raw.attributes
                .get(name)
                .ok_or_else(|| DomainError::Validation(format!("missing attribute {name}")))
        };

        let kind: NotificationKind = attribute(ATTR_EVENT_TYPE)?.parse()?;
        let event_id = Uuid::parse_str(attribute(ATTR_EVENT_ID)?)
            .map_err(|e| DomainError::Validation(format!("invalid eventId attribute: {e}")))?;
        let created_time = DateTime::parse_from_rfc3339(attribute(ATTR_CREATED_TIME)?)
            .map_err(|e| DomainError::Validation(format!("invalid createdTime attribute: {e}")))?
            .with_timezone(&Utc);
        let body: NotificationBody = serde_json::from_slice(&raw.data)
            .map_err(|e| DomainError::Validation(format!("invalid notification body: {e}")))?;

        if body.event_id != event_id {
            return Err(DomainError::Validation(format!(
                "body eventId {} does not match attribute {event_id}",
                body.event_id
            )));
        }

        Ok(Self {
            kind,
            created_time,
            body,
        })
    }
}

/// Publishes reservation notifications onto the ordered channel.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publishes `notification`, ordered by its event id.
    async fn publish(&self, notification: &ReservationNotification) -> Result<(), DomainError>;
}

/// Consumer verdict on a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Processed; never deliver again.
    Ack,
    /// Not processed; redeliver.
    Nack,
}

/// Consumes deliveries from the ordered channel.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Handles one delivery of `raw`.
    async fn handle(&self, raw: &RawNotification) -> Acknowledgement;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> ReservationNotification {
        ReservationNotification::confirmed(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_encode_sets_attributes_and_ordering_key() {
        let notification = sample();

        let raw = notification.encode("reservation-engine").unwrap();

        assert_eq!(raw.ordering_key, notification.event_id().to_string());
        assert_eq!(raw.attributes["eventType"], "reservation-confirmed");
        assert_eq!(raw.attributes["eventId"], notification.event_id().to_string());
        assert_eq!(raw.attributes["publisher"], "reservation-engine");
        let body: serde_json::Value = serde_json::from_slice(&raw.data).unwrap();
        assert_eq!(body["userId"], notification.body.user_id.to_string());
    }

    #[test]
    fn test_decode_accepts_what_encode_produces() {
        let notification = sample();
        let raw = notification.encode("reservation-engine").unwrap();

        let decoded = ReservationNotification::decode(&raw).unwrap();

        assert_eq!(decoded, notification);
        assert_eq!(decoded.idempotency_key(), notification.idempotency_key());
    }

    #[test]
    fn test_decode_rejects_unparseable_body() {
        let mut raw = sample().encode("reservation-engine").unwrap();
        raw.data = b"not json".to_vec();

        let result = ReservationNotification::decode(&raw);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_decode_rejects_mismatched_event_ids() {
        let mut raw = sample().encode("reservation-engine").unwrap();
        raw.attributes
            .insert("eventId".to_owned(), Uuid::new_v4().to_string());

        let result = ReservationNotification::decode(&raw);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_event_type() {
        let mut raw = sample().encode("reservation-engine").unwrap();
        raw.attributes
            .insert("eventType".to_owned(), "ticket-booked".to_owned());

        assert!(ReservationNotification::decode(&raw).is_err());
    }

    #[test]
    fn test_idempotency_key_differs_between_confirmations() {
        let first = sample();
        let mut second = first.clone();
        second.created_time += chrono::Duration::milliseconds(1);

        assert_ne!(first.idempotency_key(), second.idempotency_key());
        assert!(first.idempotency_key().starts_with("dequeue:"));
    }
}
