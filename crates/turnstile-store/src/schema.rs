//! Relational schema and key layout.

/// SQL that creates the ticketing tables. Identical to the first migration.
pub const CREATE_TICKETING_TABLES: &str = include_str!("../../../migrations/0001_ticketing.sql");

/// Redis key holding the soft lock of a ticket.
#[must_use]
pub fn ticket_lock_key(ticket_id: uuid::Uuid) -> String {
    format!("ticket-lock:{ticket_id}")
}

/// Redis key holding the reservation projection of a booking.
#[must_use]
pub fn reservation_key(booking_id: uuid::Uuid) -> String {
    format!("reservation:{booking_id}")
}

/// Redis key of an event's admission queue.
#[must_use]
pub fn event_queue_key(event_id: uuid::Uuid) -> String {
    format!("event-queue:{event_id}")
}

/// Redis pub/sub channel carrying an event's queue channel messages.
#[must_use]
pub fn queue_channel(event_id: uuid::Uuid) -> String {
    format!("queue-channel:{event_id}")
}

/// Pattern matching every [`queue_channel`].
pub const QUEUE_CHANNEL_PATTERN: &str = "queue-channel:*";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_key_is_scoped_by_event() {
        let event_id = uuid::Uuid::nil();
        assert_eq!(
            event_queue_key(event_id),
            "event-queue:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_queue_channel_matches_subscription_pattern() {
        let channel = queue_channel(uuid::Uuid::nil());
        let prefix = QUEUE_CHANNEL_PATTERN.trim_end_matches('*');
        assert!(channel.starts_with(prefix));
    }

    #[test]
    fn test_schema_declares_partial_unique_reference_index() {
        assert!(CREATE_TICKETING_TABLES.contains("WHERE status = 'Pending'"));
        assert!(CREATE_TICKETING_TABLES.contains("CREATE TABLE IF NOT EXISTS tickets"));
    }
}
