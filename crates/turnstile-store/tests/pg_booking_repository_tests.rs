//! Integration tests for `PgBookingRepository`.
//!
//! These need a running `PostgreSQL` reachable through `DATABASE_URL`; run
//! them with `cargo test -- --ignored`.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use turnstile_core::error::DomainError;
use turnstile_core::model::{BookingStatus, NewBooking, TicketStatus};
use turnstile_core::repository::BookingRepository;
use turnstile_store::pg_booking_repository::PgBookingRepository;
use uuid::Uuid;

async fn seed_event(pool: &PgPool, high_demand: bool) -> Uuid {
    let event_id = Uuid::new_v4();
    sqlx::query("INSERT INTO events (event_id, is_high_demand) VALUES ($1, $2)")
        .bind(event_id)
        .bind(high_demand)
        .execute(pool)
        .await
        .unwrap();
    event_id
}

async fn seed_ticket(pool: &PgPool, event_id: Uuid, seat: &str, price: Decimal) -> Uuid {
    let ticket_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO tickets (ticket_id, event_id, seat_number, price, status) \
         VALUES ($1, $2, $3, $4, 'Available')",
    )
    .bind(ticket_id)
    .bind(event_id)
    .bind(seat)
    .bind(price)
    .execute(pool)
    .await
    .unwrap();
    ticket_id
}

fn new_booking(ticket_ids: Vec<Uuid>, reference: &str) -> NewBooking {
    NewBooking {
        booking_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        ticket_ids,
        booking_date: Utc::now(),
        total_amount: Decimal::new(12500, 2),
        booking_reference: reference.to_owned(),
    }
}

// --- find_available_tickets ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_find_available_tickets_returns_only_available_rows(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, false).await;
    let a1 = seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;
    let a2 = seed_ticket(&pool, event_id, "A2", Decimal::new(7500, 2)).await;
    sqlx::query("UPDATE tickets SET status = 'Sold' WHERE ticket_id = $1")
        .bind(a2)
        .execute(&pool)
        .await
        .unwrap();

    let tickets = repo.find_available_tickets(&[a1, a2]).await.unwrap();

    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].ticket_id, a1);
    assert_eq!(tickets[0].price, Decimal::new(5000, 2));
}

// --- insert_booking ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_insert_booking_rejects_duplicate_pending_reference(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, false).await;
    let a1 = seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;

    let first = repo.insert_booking(&new_booking(vec![a1], "ref")).await.unwrap();
    let second = repo.insert_booking(&new_booking(vec![a1], "ref")).await;

    assert_eq!(first.status, BookingStatus::Pending);
    assert!(matches!(second, Err(DomainError::UnavailableTicket { .. })));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_canceled_booking_frees_its_reference(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, false).await;
    let a1 = seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;
    let first = repo.insert_booking(&new_booking(vec![a1], "ref")).await.unwrap();

    assert!(repo.cancel_booking(first.booking_id).await.unwrap());
    let second = repo.insert_booking(&new_booking(vec![a1], "ref")).await;

    assert!(second.is_ok());
    assert!(
        repo.find_pending_by_reference("ref")
            .await
            .unwrap()
            .is_some()
    );
}

// --- confirm_booking ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_confirm_booking_sells_tickets_and_confirms(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, true).await;
    let a1 = seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;
    let a2 = seed_ticket(&pool, event_id, "A2", Decimal::new(7500, 2)).await;
    let booking = repo
        .insert_booking(&new_booking(vec![a1, a2], "ref"))
        .await
        .unwrap();

    let confirmed = repo
        .confirm_booking(booking.booking_id, &[a1, a2])
        .await
        .unwrap();

    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    let tickets = repo.list_event_tickets(event_id).await.unwrap();
    assert!(tickets.iter().all(|t| t.status == TicketStatus::Sold));
    assert!(
        tickets
            .iter()
            .all(|t| t.booking_id == Some(booking.booking_id))
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_confirm_booking_rolls_back_when_a_ticket_is_already_sold(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, false).await;
    let a1 = seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;
    let a2 = seed_ticket(&pool, event_id, "A2", Decimal::new(7500, 2)).await;
    let winner = repo.insert_booking(&new_booking(vec![a2], "w")).await.unwrap();
    repo.confirm_booking(winner.booking_id, &[a2]).await.unwrap();
    let loser = repo
        .insert_booking(&new_booking(vec![a1, a2], "l"))
        .await
        .unwrap();

    let result = repo.confirm_booking(loser.booking_id, &[a1, a2]).await;

    assert!(matches!(result, Err(DomainError::ConfirmationFailed(_))));
    let available = repo.find_available_tickets(&[a1]).await.unwrap();
    assert_eq!(available.len(), 1, "A1 must not be sold by a rolled-back transaction");
    let loser = repo.find_booking(loser.booking_id).await.unwrap().unwrap();
    assert_eq!(loser.status, BookingStatus::Pending);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_second_confirmation_fails(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, false).await;
    let a1 = seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;
    let booking = repo.insert_booking(&new_booking(vec![a1], "ref")).await.unwrap();
    repo.confirm_booking(booking.booking_id, &[a1]).await.unwrap();

    let result = repo.confirm_booking(booking.booking_id, &[a1]).await;

    assert!(matches!(result, Err(DomainError::ConfirmationFailed(_))));
}

// --- events ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_find_event_for_ticket_reports_demand_flag(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, true).await;
    let a1 = seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;

    let summary = repo.find_event_for_ticket(a1).await.unwrap().unwrap();

    assert_eq!(summary.event_id, event_id);
    assert!(summary.high_demand);
    assert!(
        repo.find_event_for_ticket(Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_list_event_tickets_orders_by_seat(pool: PgPool) {
    let repo = PgBookingRepository::new(pool.clone());
    let event_id = seed_event(&pool, false).await;
    seed_ticket(&pool, event_id, "B1", Decimal::new(5000, 2)).await;
    seed_ticket(&pool, event_id, "A1", Decimal::new(5000, 2)).await;

    let seats: Vec<String> = repo
        .list_event_tickets(event_id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.seat_number)
        .collect();

    assert_eq!(seats, vec!["A1".to_owned(), "B1".to_owned()]);
}
