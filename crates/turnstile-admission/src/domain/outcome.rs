//! Results of dequeue attempts.

use uuid::Uuid;

/// What an idempotent dequeue did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueOutcome {
    /// The line advanced; holds the admitted user, or `None` if it was empty.
    Dequeued(Option<Uuid>),
    /// The triggering notification was processed before; nothing changed.
    AlreadyHandled,
}

impl DequeueOutcome {
    /// The admitted user, if this call admitted one.
    #[must_use]
    pub fn admitted(self) -> Option<Uuid> {
        match self {
            Self::Dequeued(user) => user,
            Self::AlreadyHandled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_admits_nobody() {
        let user = Uuid::new_v4();

        assert_eq!(DequeueOutcome::Dequeued(Some(user)).admitted(), Some(user));
        assert_eq!(DequeueOutcome::Dequeued(None).admitted(), None);
        assert_eq!(DequeueOutcome::AlreadyHandled.admitted(), None);
    }
}
