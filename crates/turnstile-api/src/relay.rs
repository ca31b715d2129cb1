//! Cross-instance delivery for queue channels.
//!
//! The Event Bridge talks to [`RelayedChannels`], which publishes every
//! channel message on the relay. Each instance runs [`deliver_relayed`] to
//! hand what the relay carries to its own [`ChannelHub`], so a member hears
//! about the line moving whichever instance holds its socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{error, info, warn};
use turnstile_core::error::DomainError;
use turnstile_core::realtime::{
    ChannelMessage, ChannelRelay, PositionUpdate, QueueChannels, QueueStanding,
};
use turnstile_store::redis_channel_relay;
use uuid::Uuid;

use crate::hub::ChannelHub;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Queue channels that publish through a relay instead of delivering locally.
#[derive(Clone)]
pub struct RelayedChannels {
    relay: Arc<dyn ChannelRelay>,
}

impl RelayedChannels {
    /// Publishes through `relay`.
    #[must_use]
    pub fn new(relay: Arc<dyn ChannelRelay>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl QueueChannels for RelayedChannels {
    async fn disconnect(&self, event_id: Uuid, user_id: Uuid) -> Result<(), DomainError> {
        self.relay
            .publish(&ChannelMessage::Disconnect { event_id, user_id })
            .await
    }

    async fn broadcast(&self, event_id: Uuid, update: &PositionUpdate) -> Result<(), DomainError> {
        self.relay
            .publish(&ChannelMessage::Broadcast {
                event_id,
                update: update.clone(),
            })
            .await
    }

    async fn notify(&self, event_id: Uuid, standing: &QueueStanding) -> Result<(), DomainError> {
        self.relay
            .publish(&ChannelMessage::Notify {
                event_id,
                standing: *standing,
            })
            .await
    }
}

/// Delivers relayed messages to `hub` until `messages` ends.
pub async fn deliver_relayed(messages: impl Stream<Item = ChannelMessage>, hub: Arc<ChannelHub>) {
    let mut messages = std::pin::pin!(messages);
    while let Some(message) = messages.next().await {
        if let Err(e) = message.deliver(hub.as_ref()).await {
            warn!(event_id = %message.event_id(), error = %e, "relayed channel message not delivered");
        }
    }
}

/// Keeps a Redis subscription feeding `hub`, resubscribing whenever the
/// pub/sub connection drops. Runs until the task is aborted.
pub async fn run_redis_subscription(client: redis::Client, hub: Arc<ChannelHub>) {
    loop {
        match redis_channel_relay::subscribe(&client).await {
            Ok(messages) => {
                info!("subscribed to queue channels");
                deliver_relayed(messages, Arc::clone(&hub)).await;
                warn!("queue channel subscription ended");
            }
            Err(e) => error!(error = %e, "queue channel subscription failed"),
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}
