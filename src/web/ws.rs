//! Observer WebSocket endpoints.
//!
//! Observers subscribe to every job (`/ws`) or to a single job
//! (`/ws/jobs/{id}`). The server pushes `job_update` frames as they arrive
//! from the fan-out layer, and a heartbeat frame after each full
//! `ws_heartbeat_interval` of client silence; any incoming client message
//! defers the heartbeat, and a text `ping` is answered with `pong`. Events
//! are not replayed: late subscribers reconcile through the status
//! endpoint.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::events::JobUpdate;
use crate::state::AppState;

/// Frames pushed to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ObserverFrame {
    JobUpdate(JobUpdate),
    Heartbeat,
}

/// `GET /ws` — watch every job.
pub async fn watch_all(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state, None))
}

/// `GET /ws/jobs/{id}` — watch a single job.
pub async fn watch_job(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state, Some(job_id)))
}

async fn send_frame(sink: &mut SplitSink<WebSocket, Message>, frame: &ObserverFrame) -> bool {
    let Ok(json) = serde_json::to_string(frame) else {
        return true;
    };
    sink.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, state: AppState, scope: Option<String>) {
    debug!(scope = scope.as_deref().unwrap_or("all"), "observer connected");

    let mut updates = match &scope {
        Some(job_id) => state.observers.subscribe_job(job_id),
        None => state.observers.subscribe_all(),
    };

    let (mut sink, mut stream) = socket.split();
    let heartbeat = state.config.ws_heartbeat_interval;
    // The heartbeat tracks client silence, not wall-clock cadence: any
    // incoming frame pushes the deadline out by a full interval.
    let mut silence_deadline = Instant::now() + heartbeat;

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                if !send_frame(&mut sink, &ObserverFrame::JobUpdate(update)).await {
                    break;
                }
            }
            frame = stream.next() => {
                silence_deadline = Instant::now() + heartbeat;
                match frame {
                    Some(Ok(Message::Text(text))) if text.as_str() == "ping" => {
                        if sink.send(Message::Text("pong".into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = sleep_until(silence_deadline) => {
                if !send_frame(&mut sink, &ObserverFrame::Heartbeat).await {
                    break;
                }
                silence_deadline = Instant::now() + heartbeat;
            }
        }
    }

    // Dropping the receiver evicts this observer on the next dispatch.
    debug!(scope = scope.as_deref().unwrap_or("all"), "observer disconnected");
}
