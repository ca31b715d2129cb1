//! Realtime channel hub for admission queue WebSockets.
//!
//! Every queue member with an open socket is registered under its event. The
//! hub only reaches in-process connections; messages for members on other
//! instances travel through [`crate::relay`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use turnstile_core::error::DomainError;
use turnstile_core::realtime::{PositionUpdate, QueueChannels, QueueStanding};
use uuid::Uuid;

/// A message queued for one socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HubMessage {
    /// The member's own standing.
    Standing(QueueStanding),
    /// The line moved.
    Update(PositionUpdate),
    /// A request the socket sent was rejected.
    Error {
        /// Machine-readable error code.
        error: &'static str,
        /// Human-readable error message.
        message: String,
    },
    /// The server is releasing the member; close the socket.
    #[serde(skip)]
    Close,
}

#[derive(Debug)]
struct Member {
    connection_id: u64,
    tx: mpsc::UnboundedSender<HubMessage>,
}

/// Registry of open queue sockets, keyed by event then user.
#[derive(Debug, Default)]
pub struct ChannelHub {
    next_connection: AtomicU64,
    members: Mutex<HashMap<Uuid, HashMap<Uuid, Member>>>,
}

impl ChannelHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for a new socket.
    pub fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers `tx` as the channel of `user_id` in `event_id`, replacing any
    /// earlier registration of that user.
    pub fn register(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        connection_id: u64,
        tx: mpsc::UnboundedSender<HubMessage>,
    ) {
        if let Ok(mut members) = self.members.lock() {
            members
                .entry(event_id)
                .or_default()
                .insert(user_id, Member { connection_id, tx });
        }
    }

    /// Removes the membership if it still belongs to `connection_id`.
    pub fn unregister(&self, event_id: Uuid, user_id: Uuid, connection_id: u64) {
        let Ok(mut members) = self.members.lock() else {
            return;
        };
        if let Some(event_members) = members.get_mut(&event_id) {
            if event_members
                .get(&user_id)
                .is_some_and(|m| m.connection_id == connection_id)
            {
                event_members.remove(&user_id);
                debug!(%event_id, %user_id, "queue membership removed");
            }
            if event_members.is_empty() {
                members.remove(&event_id);
            }
        }
    }

    /// Number of registered memberships across all events.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.members
            .lock()
            .map(|members| members.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// Whether `user_id` holds a membership in `event_id`.
    #[must_use]
    pub fn is_member(&self, event_id: Uuid, user_id: Uuid) -> bool {
        self.members
            .lock()
            .map(|members| {
                members
                    .get(&event_id)
                    .is_some_and(|m| m.contains_key(&user_id))
            })
            .unwrap_or(false)
    }

    fn poisoned() -> DomainError {
        DomainError::Infrastructure("channel hub lock poisoned".into())
    }
}

#[async_trait]
impl QueueChannels for ChannelHub {
    async fn disconnect(&self, event_id: Uuid, user_id: Uuid) -> Result<(), DomainError> {
        let removed = {
            let mut members = self.members.lock().map_err(|_| Self::poisoned())?;
            let removed = members
                .get_mut(&event_id)
                .and_then(|event_members| event_members.remove(&user_id));
            if members.get(&event_id).is_some_and(HashMap::is_empty) {
                members.remove(&event_id);
            }
            removed
        };
        if let Some(member) = removed {
            // Receiver may already be gone.
            let _ = member.tx.send(HubMessage::Close);
        }
        Ok(())
    }

    async fn broadcast(&self, event_id: Uuid, update: &PositionUpdate) -> Result<(), DomainError> {
        let members = self.members.lock().map_err(|_| Self::poisoned())?;
        if let Some(event_members) = members.get(&event_id) {
            for member in event_members.values() {
                let _ = member.tx.send(HubMessage::Update(update.clone()));
            }
        }
        Ok(())
    }

    async fn notify(&self, event_id: Uuid, standing: &QueueStanding) -> Result<(), DomainError> {
        let members = self.members.lock().map_err(|_| Self::poisoned())?;
        if let Some(member) = members
            .get(&event_id)
            .and_then(|event_members| event_members.get(&standing.user_id))
        {
            let _ = member.tx.send(HubMessage::Standing(*standing));
        }
        Ok(())
    }
}
