//! Integration tests for the Redis adapters.
//!
//! These need a running Redis reachable through `REDIS_URL` (default
//! `redis://127.0.0.1:6379`); run them with `cargo test -- --ignored`.
//! Every test works on fresh random ids so runs do not collide.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use redis::aio::ConnectionManager;
use turnstile_core::clock::SystemClock;
use turnstile_core::guard::IdempotencyGuard;
use turnstile_core::lock::{ReservationProjection, SoftLockStore};
use turnstile_core::queue::AdmissionQueueStore;
use turnstile_core::realtime::{ChannelMessage, ChannelRelay, PositionUpdate};
use turnstile_store::redis_channel_relay::{self, RedisChannelRelay};
use turnstile_store::redis_guard::RedisIdempotencyGuard;
use turnstile_store::redis_lock_store::RedisSoftLockStore;
use turnstile_store::redis_queue_store::RedisAdmissionQueue;
use uuid::Uuid;

fn client() -> redis::Client {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
    redis::Client::open(url).unwrap()
}

async fn connection() -> ConnectionManager {
    ConnectionManager::new(client()).await.unwrap()
}

async fn lock_store() -> RedisSoftLockStore {
    RedisSoftLockStore::new(connection().await, Arc::new(SystemClock))
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_queue_pops_users_in_join_order() {
    // Arrange
    let queue = RedisAdmissionQueue::new(connection().await);
    let event = Uuid::new_v4();
    let (first, second, third) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    queue.add(event, second, 1_000).await.unwrap();
    queue.add(event, first, 900).await.unwrap();
    queue.add(event, third, 1_100).await.unwrap();

    // Act / Assert
    assert_eq!(queue.len(event).await.unwrap(), 3);
    assert_eq!(queue.rank(event, third).await.unwrap(), Some(2));
    assert_eq!(queue.pop_min(event).await.unwrap(), Some(first));
    assert_eq!(queue.pop_min(event).await.unwrap(), Some(second));
    assert_eq!(queue.pop_min(event).await.unwrap(), Some(third));
    assert_eq!(queue.len(event).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_pop_from_empty_queue_returns_none() {
    let queue = RedisAdmissionQueue::new(connection().await);
    let event = Uuid::new_v4();

    assert_eq!(queue.pop_min(event).await.unwrap(), None);
    assert_eq!(queue.rank(event, Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_rejoin_keeps_original_place() {
    let queue = RedisAdmissionQueue::new(connection().await);
    let event = Uuid::new_v4();
    let (early, late) = (Uuid::new_v4(), Uuid::new_v4());
    queue.add(event, early, 100).await.unwrap();
    queue.add(event, late, 200).await.unwrap();

    queue.add(event, early, 300).await.unwrap();

    assert_eq!(queue.rank(event, early).await.unwrap(), Some(0));
    assert_eq!(queue.len(event).await.unwrap(), 2);
    queue.pop_min(event).await.unwrap();
    queue.pop_min(event).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_locks_block_until_their_ttl_lapses() {
    // Arrange
    let store = lock_store().await;
    let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
    let user = Uuid::new_v4();

    // Act
    store
        .lock_all(&[t1, t2], user, Duration::from_millis(80))
        .await
        .unwrap();

    // Assert
    let held = store.are_available(&[t1, t2]).await.unwrap();
    assert!(!held.available);
    assert_eq!(held.blocked_ids, vec![t1, t2]);
    assert!(!store.are_expired(&[t1, t2]).await.unwrap().expired);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let lapsed = store.are_expired(&[t1, t2]).await.unwrap();
    assert!(lapsed.expired);
    assert_eq!(lapsed.expired_ids, vec![t1, t2]);
    assert!(store.are_available(&[t1, t2]).await.unwrap().available);
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_increase_lock_time_outlives_original_ttl() {
    let store = lock_store().await;
    let ticket = Uuid::new_v4();
    let user = Uuid::new_v4();
    store
        .lock_all(&[ticket], user, Duration::from_millis(80))
        .await
        .unwrap();

    store
        .increase_lock_time(&[ticket], user, Duration::from_secs(5))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!store.are_expired(&[ticket]).await.unwrap().expired);
    store.release_lock(&[ticket]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_release_frees_only_named_tickets() {
    let store = lock_store().await;
    let (released, kept) = (Uuid::new_v4(), Uuid::new_v4());
    store
        .lock_all(&[released, kept], Uuid::new_v4(), Duration::from_secs(5))
        .await
        .unwrap();

    store.release_lock(&[released]).await.unwrap();

    let availability = store.are_available(&[released, kept]).await.unwrap();
    assert_eq!(availability.blocked_ids, vec![kept]);
    store.release_lock(&[kept]).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_reservation_projection_lives_for_its_ttl() {
    // Arrange
    let store = lock_store().await;
    let projection = ReservationProjection {
        booking_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        ticket_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
    };

    // Act
    store
        .set_reservation(&projection, Duration::from_millis(80))
        .await
        .unwrap();

    // Assert
    assert_eq!(
        store.get_reservation(projection.booking_id).await.unwrap(),
        Some(projection.clone())
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.get_reservation(projection.booking_id).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_guard_marker_is_present_after_marking() {
    let guard = RedisIdempotencyGuard::new(connection().await);
    let key = format!("dequeue:{}", Uuid::new_v4());

    assert!(!guard.was_executed(&key).await.unwrap());
    guard
        .mark_executed(&key, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(guard.was_executed(&key).await.unwrap());
    assert!(!guard.was_executed(&format!("{key}-other")).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_guard_marker_lapses_with_its_ttl() {
    let guard = RedisIdempotencyGuard::new(connection().await);
    let key = format!("dequeue:{}", Uuid::new_v4());

    guard
        .mark_executed(&key, Duration::from_millis(80))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!guard.was_executed(&key).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis (REDIS_URL)"]
async fn test_relayed_message_reaches_every_subscriber() {
    // Arrange
    let first = redis_channel_relay::subscribe(&client()).await.unwrap();
    let second = redis_channel_relay::subscribe(&client()).await.unwrap();
    let mut first = Box::pin(first);
    let mut second = Box::pin(second);
    let relay = RedisChannelRelay::new(connection().await);
    let message = ChannelMessage::Broadcast {
        event_id: Uuid::new_v4(),
        update: PositionUpdate::advanced(),
    };

    // Act
    relay.publish(&message).await.unwrap();

    // Assert
    let wait = Duration::from_secs(2);
    let heard_first = tokio::time::timeout(wait, async {
        loop {
            let heard = first.next().await.unwrap();
            if heard == message {
                return heard;
            }
        }
    });
    let heard_second = tokio::time::timeout(wait, async {
        loop {
            let heard = second.next().await.unwrap();
            if heard == message {
                return heard;
            }
        }
    });
    assert_eq!(heard_first.await.unwrap(), message);
    assert_eq!(heard_second.await.unwrap(), message);
}
