//! Test queue channels that record every delivery, and an in-process relay.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::broadcast;
use turnstile_core::error::DomainError;
use turnstile_core::realtime::{
    ChannelMessage, ChannelRelay, PositionUpdate, QueueChannels, QueueStanding,
};
use uuid::Uuid;

/// A single call observed by [`RecordingQueueChannels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    /// `disconnect(event_id, user_id)`.
    Disconnect {
        /// Event channel.
        event_id: Uuid,
        /// Member removed.
        user_id: Uuid,
    },
    /// `broadcast(event_id, update)`.
    Broadcast {
        /// Event channel.
        event_id: Uuid,
        /// Update sent.
        update: PositionUpdate,
    },
    /// `notify(event_id, standing)`.
    Notify {
        /// Event channel.
        event_id: Uuid,
        /// Standing sent.
        standing: QueueStanding,
    },
}

/// Queue channels that record calls in order and always succeed.
#[derive(Debug, Default)]
pub struct RecordingQueueChannels {
    calls: Mutex<Vec<ChannelCall>>,
}

impl RecordingQueueChannels {
    /// Creates a recorder with no calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every call so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ChannelCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueChannels for RecordingQueueChannels {
    async fn disconnect(&self, event_id: Uuid, user_id: Uuid) -> Result<(), DomainError> {
        self.record(ChannelCall::Disconnect { event_id, user_id });
        Ok(())
    }

    async fn broadcast(&self, event_id: Uuid, update: &PositionUpdate) -> Result<(), DomainError> {
        self.record(ChannelCall::Broadcast {
            event_id,
            update: update.clone(),
        });
        Ok(())
    }

    async fn notify(&self, event_id: Uuid, standing: &QueueStanding) -> Result<(), DomainError> {
        self.record(ChannelCall::Notify {
            event_id,
            standing: *standing,
        });
        Ok(())
    }
}

/// Relay that fans messages out to every in-process subscriber, standing in
/// for pub/sub shared by several instances.
#[derive(Debug, Clone)]
pub struct InMemoryChannelRelay {
    sender: broadcast::Sender<ChannelMessage>,
}

impl Default for InMemoryChannelRelay {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

impl InMemoryChannelRelay {
    /// Creates a relay with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every message published from now on.
    pub fn subscribe(&self) -> impl Stream<Item = ChannelMessage> + Send + 'static {
        futures::stream::unfold(self.sender.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

#[async_trait]
impl ChannelRelay for InMemoryChannelRelay {
    async fn publish(&self, message: &ChannelMessage) -> Result<(), DomainError> {
        // No subscribers is not an error.
        let _ = self.sender.send(message.clone());
        Ok(())
    }
}
