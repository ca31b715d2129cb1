//! Commands for the Admission Controller.

use turnstile_core::command::Command;
use uuid::Uuid;

/// Command to put a user in an event's waiting line.
#[derive(Debug, Clone)]
pub struct JoinQueue {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Event being queued for.
    pub event_id: Uuid,
    /// Waiting user.
    pub user_id: Uuid,
}

impl Command for JoinQueue {
    fn command_type(&self) -> &'static str {
        "admission.join_queue"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to admit the user at the front of an event's line.
#[derive(Debug, Clone)]
pub struct DequeueNext {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Event whose line advances.
    pub event_id: Uuid,
}

impl Command for DequeueNext {
    fn command_type(&self) -> &'static str {
        "admission.dequeue_next"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
