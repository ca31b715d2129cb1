//! Redis pub/sub relay for queue channel messages.
//!
//! A message for an event is published on `queue-channel:{event_id}`. Every
//! instance pattern-subscribes to all queue channels and delivers what it
//! hears to its own sockets.

use async_trait::async_trait;
use futures::{Stream, StreamExt, future};
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{instrument, warn};

use turnstile_core::error::DomainError;
use turnstile_core::realtime::{ChannelMessage, ChannelRelay};

use crate::redis_error;
use crate::schema::{QUEUE_CHANNEL_PATTERN, queue_channel};

/// Publishing side of the relay.
#[derive(Clone)]
pub struct RedisChannelRelay {
    conn_manager: ConnectionManager,
}

impl RedisChannelRelay {
    /// Wraps an existing connection manager.
    #[must_use]
    pub fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

#[async_trait]
impl ChannelRelay for RedisChannelRelay {
    #[instrument(skip_all, fields(event_id = %message.event_id()))]
    async fn publish(&self, message: &ChannelMessage) -> Result<(), DomainError> {
        let payload = serde_json::to_string(message).map_err(|e| {
            DomainError::Infrastructure(format!("channel message serialization failed: {e}"))
        })?;
        let mut conn = self.conn_manager.clone();
        let _receivers: i64 = redis::cmd("PUBLISH")
            .arg(queue_channel(message.event_id()))
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("failed to publish channel message", &e))?;
        Ok(())
    }
}

/// Opens a dedicated pub/sub connection subscribed to every queue channel.
///
/// The stream ends when the connection drops. Payloads that do not decode
/// are logged and skipped.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the connection or the
/// subscription fails.
pub async fn subscribe(
    client: &Client,
) -> Result<impl Stream<Item = ChannelMessage> + Send + 'static, DomainError> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| redis_error("failed to open pub/sub connection", &e))?;
    pubsub
        .psubscribe(QUEUE_CHANNEL_PATTERN)
        .await
        .map_err(|e| redis_error("failed to subscribe to queue channels", &e))?;

    Ok(pubsub
        .into_on_message()
        .filter_map(|msg| future::ready(decode(&msg))))
}

fn decode(msg: &redis::Msg) -> Option<ChannelMessage> {
    let payload: String = match msg.get_payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(channel = msg.get_channel_name(), error = %e, "unreadable channel payload");
            return None;
        }
    };
    match serde_json::from_str(&payload) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(channel = msg.get_channel_name(), error = %e, "discarding malformed channel message");
            None
        }
    }
}
