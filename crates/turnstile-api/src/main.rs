//! Turnstile API server entry point.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use turnstile_admission::application::event_bridge::ReservationEventBridge;
use turnstile_core::clock::{Clock, SystemClock};
use turnstile_store::notification_bus;
use turnstile_store::pg_booking_repository::PgBookingRepository;
use turnstile_store::redis_channel_relay::RedisChannelRelay;
use turnstile_store::redis_guard::RedisIdempotencyGuard;
use turnstile_store::redis_lock_store::RedisSoftLockStore;
use turnstile_store::redis_queue_store::RedisAdmissionQueue;

use turnstile_api::config::Config;
use turnstile_api::error::AppError;
use turnstile_api::hub::ChannelHub;
use turnstile_api::relay::{self, RelayedChannels};
use turnstile_api::state::AppState;
use turnstile_api::{bridge, build_router, telemetry};

const PUBLISHER_NAME: &str = "reservation-engine";
const CONSUMER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let tracer_provider = telemetry::init(config.otlp_endpoint.as_deref())?;

    info!("Starting Turnstile API server");

    // Relational store.
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    // Key-value store.
    let redis = redis::Client::open(config.redis_url.as_str())?;
    let conn_manager = redis::aio::ConnectionManager::new(redis.clone()).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let hub = Arc::new(ChannelHub::new());
    let queue = Arc::new(RedisAdmissionQueue::new(conn_manager.clone()));

    // Channel messages go out over pub/sub; this instance delivers what it
    // hears to its own sockets.
    let relay_task = tokio::spawn(relay::run_redis_subscription(redis, hub.clone()));
    let channels = RelayedChannels::new(Arc::new(RedisChannelRelay::new(conn_manager.clone())));

    // Event Bridge: reservation notifications advance the admission queue.
    let (bus, consumer) = notification_bus::channel(PUBLISHER_NAME, config.notification_max_deliveries);
    let event_bridge = Arc::new(ReservationEventBridge::new(
        config.admission,
        queue.clone(),
        Arc::new(RedisIdempotencyGuard::new(conn_manager.clone())),
        Arc::new(channels),
    ));
    let consumer_task = bridge::spawn_consumer(consumer, event_bridge);

    let app_state = AppState::new(
        clock.clone(),
        Arc::new(RedisSoftLockStore::new(conn_manager, clock)),
        Arc::new(PgBookingRepository::new(pool)),
        queue,
        Arc::new(bus),
        hub,
        config.reservation,
    );

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.listen_addr()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Open queue sockets may still hold publisher handles.
    match tokio::time::timeout(CONSUMER_DRAIN_TIMEOUT, consumer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "notification consumer panicked"),
        Err(_) => tracing::warn!("notification consumer still busy at shutdown"),
    }
    relay_task.abort();
    info!("Turnstile API server stopped");
    telemetry::shutdown(tracer_provider);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
