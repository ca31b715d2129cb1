//! WebSocket route for the admission queue.
//!
//! Clients send `join-queue` messages and receive their standing, line
//! movement broadcasts, and finally a `proceed-to-booking` standing. The
//! socket is closed by the server once the member's turn is used up.

use std::collections::HashSet;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use turnstile_admission::application::command_handlers;
use turnstile_admission::domain::commands;

use crate::error::ErrorBody;
use crate::hub::HubMessage;
use crate::state::AppState;

/// Inbound socket message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event")]
pub enum ClientMessage {
    /// Enter (or re-attach to) an event's line.
    #[serde(rename = "join-queue", rename_all = "camelCase")]
    JoinQueue {
        /// Queue member.
        user_id: Uuid,
        /// Event whose line to join.
        event_id: Uuid,
    },
}

/// GET /booking-queue
#[allow(clippy::unused_async)]
async fn booking_queue(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("queue socket requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = state.hub.next_connection_id();
    debug!(connection_id, "queue socket established");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<HubMessage>();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let frame = match message {
                HubMessage::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                other => match serde_json::to_string(&other) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        error!(error = %e, "failed to serialize queue message");
                        continue;
                    }
                },
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
        debug!("queue socket send task terminated");
    });

    let mut memberships = HashSet::new();
    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(membership) =
                        handle_client_text(text.as_str(), &state, connection_id, &tx).await
                    {
                        memberships.insert(membership);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "queue socket receive failed");
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    for (event_id, user_id) in memberships {
        state.hub.unregister(event_id, user_id, connection_id);
    }
    send_task.abort();
    debug!(connection_id, "queue socket closed");
}

/// Applies one text frame. Returns the `(event_id, user_id)` membership the
/// connection gained, if any.
pub async fn handle_client_text(
    text: &str,
    state: &AppState,
    connection_id: u64,
    tx: &mpsc::UnboundedSender<HubMessage>,
) -> Option<(Uuid, Uuid)> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "unparseable queue message");
            let _ = tx.send(HubMessage::Error {
                error: "invalid_message",
                message: e.to_string(),
            });
            return None;
        }
    };

    let ClientMessage::JoinQueue { user_id, event_id } = message;
    let command = commands::JoinQueue {
        correlation_id: Uuid::new_v4(),
        event_id,
        user_id,
    };
    match command_handlers::handle_join_queue(&command, state.clock.as_ref(), state.queue.as_ref())
        .await
    {
        Ok(standing) => {
            state.hub.register(event_id, user_id, connection_id, tx.clone());
            let _ = tx.send(HubMessage::Standing(standing));
            Some((event_id, user_id))
        }
        Err(e) => {
            let (_, body) = ErrorBody::from_domain(&e);
            let _ = tx.send(HubMessage::Error {
                error: body.error,
                message: body.message,
            });
            None
        }
    }
}

/// Returns the router for the admission queue socket.
pub fn router() -> Router<AppState> {
    Router::new().route("/booking-queue", get(booking_queue))
}
