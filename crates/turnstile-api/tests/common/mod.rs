//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use tower::ServiceExt;
use turnstile_core::model::Ticket;
use turnstile_reservation::application::settings::ReservationSettings;
use turnstile_test_support::{
    InMemoryAdmissionQueue, InMemoryBookingRepository, InMemorySoftLockStore, ManualClock,
    RecordingPublisher, ticket,
};
use uuid::Uuid;

use turnstile_api::build_router;
use turnstile_api::hub::ChannelHub;
use turnstile_api::state::AppState;

/// In-memory backing stores plus handles to inspect them.
pub struct TestApp {
    pub clock: ManualClock,
    pub locks: Arc<InMemorySoftLockStore>,
    pub bookings: Arc<InMemoryBookingRepository>,
    pub queue: Arc<InMemoryAdmissionQueue>,
    pub publisher: Arc<RecordingPublisher>,
    pub hub: Arc<ChannelHub>,
    pub state: AppState,
}

impl TestApp {
    /// Build the app state over fresh fakes, starting at 2026-01-15 10:00 UTC.
    pub fn new() -> Self {
        let clock = ManualClock::new(
            chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
        );
        let shared_clock = Arc::new(clock.clone());
        let locks = Arc::new(InMemorySoftLockStore::new(shared_clock.clone()));
        let bookings = Arc::new(InMemoryBookingRepository::new());
        let queue = Arc::new(InMemoryAdmissionQueue::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let hub = Arc::new(ChannelHub::new());
        let state = AppState::new(
            shared_clock,
            locks.clone(),
            bookings.clone(),
            queue.clone(),
            publisher.clone(),
            hub.clone(),
            ReservationSettings::default(),
        );
        Self {
            clock,
            locks,
            bookings,
            queue,
            publisher,
            hub,
            state,
        }
    }

    /// The full router, as `main.rs` builds it minus middleware.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Seeds an event with `seats` available tickets at 50.00.
    pub fn seed_event(&self, high_demand: bool, seats: &[&str]) -> (Uuid, Vec<Ticket>) {
        let event_id = Uuid::new_v4();
        self.bookings.add_event(event_id, high_demand);
        let tickets: Vec<Ticket> = seats
            .iter()
            .map(|seat| ticket(event_id, seat, Decimal::new(5000, 2)))
            .collect();
        for t in &tickets {
            self.bookings.add_ticket(t.clone());
        }
        (event_id, tickets)
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a PATCH request without a body and return the response.
pub async fn patch(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("PATCH")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}
