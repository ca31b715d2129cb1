//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// The variants follow the failure taxonomy shared by every component:
/// conflicts and expiries are user-visible and carry the offending ticket ids,
/// confirmation failures are server faults, and infrastructure failures are
/// transient and may be retried by the caller.
#[derive(Debug, Error)]
pub enum DomainError {
    /// One or more tickets are soft-locked or no longer available.
    #[error("tickets unavailable: {ticket_ids:?}")]
    UnavailableTicket {
        /// The tickets that blocked the request.
        ticket_ids: Vec<Uuid>,
    },

    /// The reservation's soft locks lapsed before it was confirmed.
    #[error("reservation expired; lapsed tickets: {ticket_ids:?}")]
    ReservationExpired {
        /// The tickets whose locks are gone.
        ticket_ids: Vec<Uuid>,
    },

    /// The guarded confirmation update touched the wrong number of rows.
    #[error("confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// A durable record was not found.
    #[error("not found: {0}")]
    NotFound(Uuid),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A store was unreachable or returned an unexpected failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` when the caller may retry the same request unchanged.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }

    /// Returns the ticket ids a client should drop from its selection, if any.
    #[must_use]
    pub fn offending_ticket_ids(&self) -> &[Uuid] {
        match self {
            Self::UnavailableTicket { ticket_ids } | Self::ReservationExpired { ticket_ids } => {
                ticket_ids
            }
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_infrastructure_errors_are_transient() {
        assert!(DomainError::Infrastructure("redis down".into()).is_transient());
        assert!(!DomainError::ConfirmationFailed("row count".into()).is_transient());
        assert!(
            !DomainError::UnavailableTicket {
                ticket_ids: vec![Uuid::new_v4()]
            }
            .is_transient()
        );
    }

    #[test]
    fn test_offending_ticket_ids_are_exposed_for_conflict_and_expiry() {
        let id = Uuid::new_v4();

        let conflict = DomainError::UnavailableTicket {
            ticket_ids: vec![id],
        };
        let expired = DomainError::ReservationExpired {
            ticket_ids: vec![id],
        };

        assert_eq!(conflict.offending_ticket_ids(), &[id]);
        assert_eq!(expired.offending_ticket_ids(), &[id]);
        assert!(
            DomainError::NotFound(id)
                .offending_ticket_ids()
                .is_empty()
        );
    }
}
