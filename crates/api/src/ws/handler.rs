use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use siteaudit_core::event::ScanEvent;
use siteaudit_core::types::JobId;

use crate::state::AppState;

/// Control messages accepted from an observer.
///
/// `sessionId` is the scan job id. Unsubscribing without one drops every
/// subscription this connection holds.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ControlMessage {
    Subscribe {
        #[serde(rename = "sessionId")]
        session_id: JobId,
    },
    Unsubscribe {
        #[serde(rename = "sessionId")]
        session_id: Option<JobId>,
    },
}

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager` (control frames) and
///      creates an event channel for `ScanBroadcaster` subscriptions.
///   2. Spawns a sender task that forwards control frames and serialized
///      scan events to the WebSocket sink.
///   3. Processes inbound subscribe/unsubscribe messages on this task.
///   4. Cleans up both registries on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut control_rx = state.ws_manager.add(conn_id.clone()).await;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ScanEvent>();

    let (mut sink, mut stream) = socket.split();

    // Sender task: interleave control frames and scan events. Events for
    // one job arrive through one ordered channel, so per-job ordering is
    // preserved all the way to the wire.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = control_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                event = event_rx.recv() => match event {
                    Some(event) => Message::Text(event.to_wire().to_string().into()),
                    None => break,
                },
            };

            let closing = matches!(frame, Message::Close(_));
            if sink.send(frame).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Receiver loop: process inbound control messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_control_message(&text, &conn_id, &state, &event_tx).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: drop subscriptions, deregister, stop the sender.
    state.broadcaster.disconnect(&conn_id).await;
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Apply one inbound control message to the subscription registry.
///
/// Unrecognized messages are logged and ignored — a misbehaving observer
/// must never take the connection down.
async fn handle_control_message(
    text: &str,
    conn_id: &str,
    state: &AppState,
    event_tx: &mpsc::UnboundedSender<ScanEvent>,
) {
    match serde_json::from_str::<ControlMessage>(text) {
        Ok(ControlMessage::Subscribe { session_id }) => {
            state
                .broadcaster
                .subscribe(session_id, conn_id, event_tx.clone())
                .await;
            tracing::debug!(conn_id, session_id, "Observer subscribed to scan");
        }
        Ok(ControlMessage::Unsubscribe {
            session_id: Some(session_id),
        }) => {
            state.broadcaster.unsubscribe(session_id, conn_id).await;
        }
        Ok(ControlMessage::Unsubscribe { session_id: None }) => {
            state.broadcaster.disconnect(conn_id).await;
        }
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Ignoring unrecognized WebSocket message");
        }
    }
}
