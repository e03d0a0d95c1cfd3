//! Fan-out of poll state changes to connected display clients.
//!
//! Delivery is best-effort: an event reaches the subscribers connected when
//! it is published and nobody else. Late subscribers re-query current state.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::AppState;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    VoteCast { poll_id: i64 },
    PollActivated { poll_id: i64 },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no connected subscribers")]
    NoSubscribers,
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<PollEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.tx.subscribe()
    }

    /// Publishes `event` to every current subscriber and returns how many
    /// there were.
    ///
    /// Callers fire and forget: the result is meant to be discarded, and a
    /// failed delivery never affects the write that triggered it.
    pub fn publish(&self, event: PollEvent) -> Result<usize, NotifyError> {
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(?event, receivers, "event published");
                Ok(receivers)
            }
            Err(_) => {
                debug!(?event, "event dropped, no subscribers");
                Err(NotifyError::NoSubscribers)
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /ws`: pushes every published event to the client as a JSON text frame.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before the upgrade completes so nothing published after the
    // handshake is missed.
    let rx = state.notifier.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(socket: WebSocket, mut rx: broadcast::Receiver<PollEvent>) {
    let (mut sender, mut receiver) = socket.split();
    info!("display client connected");

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("websocket error: {}", e);
                        break;
                    }
                }
            }

            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "display client lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("display client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_an_error_not_a_panic() {
        let notifier = Notifier::new();
        assert!(notifier.publish(PollEvent::VoteCast { poll_id: 1 }).is_err());
    }

    #[tokio::test]
    async fn subscribers_only_see_events_published_after_they_joined() {
        let notifier = Notifier::new();
        let mut early = notifier.subscribe();

        notifier.publish(PollEvent::PollActivated { poll_id: 1 }).unwrap();
        let mut late = notifier.subscribe();
        notifier.publish(PollEvent::VoteCast { poll_id: 1 }).unwrap();

        assert_eq!(early.recv().await.unwrap(), PollEvent::PollActivated { poll_id: 1 });
        assert_eq!(early.recv().await.unwrap(), PollEvent::VoteCast { poll_id: 1 });
        assert_eq!(late.recv().await.unwrap(), PollEvent::VoteCast { poll_id: 1 });
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_their_kind() {
        let json = serde_json::to_value(PollEvent::VoteCast { poll_id: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "vote_cast", "poll_id": 7 }));

        let json = serde_json::to_value(PollEvent::PollActivated { poll_id: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "poll_activated", "poll_id": 2 }));
    }
}
