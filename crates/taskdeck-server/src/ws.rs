//! Live dashboard feed over WebSocket.
//!
//! A connection is subscribed for its whole lifetime: it first receives the
//! status and task-list snapshot, then every broadcast event. The only client
//! message understood is `{"type": "ping"}`, answered with `{"type": "pong"}`.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use taskdeck_core::event::DashboardEvent;

use crate::AppState;

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
}

/// Reply for a client text frame, if any.
fn reply_to(text: &str) -> Option<DashboardEvent> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) if message.kind == "ping" => Some(DashboardEvent::Pong),
        Ok(message) => {
            tracing::debug!(kind = %message.kind, "ignoring client message");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "malformed client message");
            None
        }
    }
}

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.orchestrator.subscribe().await;
    let subscriber_id = subscription.id();
    tracing::info!(subscriber_id, "dashboard connected");

    loop {
        let outgoing = tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => event,
                None => {
                    tracing::warn!(subscriber_id, "subscription dropped by broadcaster");
                    break;
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match reply_to(text.as_str()) {
                    Some(reply) => reply,
                    None => continue,
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(subscriber_id, error = %e, "websocket receive error");
                    break;
                }
            },
        };

        let payload = match serde_json::to_string(&outgoing) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(subscriber_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if sender.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }

    state.orchestrator.unsubscribe(subscriber_id);
    tracing::info!(subscriber_id, "dashboard disconnected");
}
