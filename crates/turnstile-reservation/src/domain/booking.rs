//! Booking rules that need no I/O.

use std::collections::HashSet;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use turnstile_core::error::DomainError;
use turnstile_core::model::Ticket;
use uuid::Uuid;

/// Deterministic hash of the buyer and the sorted ticket set.
///
/// Two requests for the same tickets by the same user produce the same
/// reference regardless of the order the ids were submitted in.
#[must_use]
pub fn booking_reference(user_id: Uuid, ticket_ids: &[Uuid]) -> String {
    let mut sorted = ticket_ids.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    for id in &sorted {
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Sum of the ticket prices.
#[must_use]
pub fn total_amount(tickets: &[Ticket]) -> Decimal {
    tickets.iter().map(|t| t.price).sum()
}

/// Checks the shape of a reservation request.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the user id is nil, no tickets are
/// given, or a ticket id repeats.
pub fn validate_request(user_id: Uuid, ticket_ids: &[Uuid]) -> Result<(), DomainError> {
    if user_id.is_nil() {
        return Err(DomainError::Validation("userId must not be empty".into()));
    }
    if ticket_ids.is_empty() {
        return Err(DomainError::Validation("ticketIds must not be empty".into()));
    }
    let mut seen = HashSet::with_capacity(ticket_ids.len());
    if let Some(dup) = ticket_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(DomainError::Validation(format!(
            "ticket {dup} appears more than once"
        )));
    }
    Ok(())
}

/// Ids in `requested` that are not in `found`, in request order.
#[must_use]
pub fn missing_ids(requested: &[Uuid], found: &[Ticket]) -> Vec<Uuid> {
    let found: HashSet<Uuid> = found.iter().map(|t| t.ticket_id).collect();
    requested
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use turnstile_core::model::TicketStatus;

    use super::*;

    fn priced(cents: i64) -> Ticket {
        Ticket {
            ticket_id: Uuid::new_v4(),
            event_id: Uuid::nil(),
            seat_number: "A1".to_owned(),
            price: Decimal::new(cents, 2),
            status: TicketStatus::Available,
            booking_id: None,
        }
    }

    #[test]
    fn test_reference_ignores_ticket_order() {
        let user = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(booking_reference(user, &[a, b]), booking_reference(user, &[b, a]));
        assert_ne!(
            booking_reference(user, &[a, b]),
            booking_reference(Uuid::new_v4(), &[a, b])
        );
        assert_eq!(booking_reference(user, &[a]).len(), 64);
    }

    #[test]
    fn test_total_sums_prices() {
        let tickets = vec![priced(5000), priced(7500)];

        assert_eq!(total_amount(&tickets), Decimal::new(12500, 2));
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicate_requests() {
        let id = Uuid::new_v4();

        assert!(validate_request(Uuid::nil(), &[id]).is_err());
        assert!(validate_request(Uuid::new_v4(), &[]).is_err());
        assert!(validate_request(Uuid::new_v4(), &[id, id]).is_err());
        assert!(validate_request(Uuid::new_v4(), &[id]).is_ok());
    }

    #[test]
    fn test_missing_ids_keeps_request_order() {
        let found = priced(100);
        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());

        let missing = missing_ids(&[x, found.ticket_id, y], &[found]);

        assert_eq!(missing, vec![x, y]);
    }
}
