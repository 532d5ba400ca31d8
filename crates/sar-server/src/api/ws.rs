//! WebSocket streaming of collection snapshots.
use crate::api::error::ApiError;
use crate::state::{AppState, SnapshotEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use sar_core::Topic;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Deserialize, Default)]
pub struct WsQuery {
    /// Comma-separated collections; all of them when absent
    collection: Option<String>,
}

fn parse_topics(raw: Option<&str>) -> Result<Vec<Topic>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Topic::ALL.to_vec());
    };
    let mut topics = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let topic: Topic = part.parse()?;
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    Ok(topics)
}

/// Handler for WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
) -> Response {
    let topics = match parse_topics(params.collection.as_deref()) {
        Ok(topics) => topics,
        Err(err) => return err.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, topics))
        .into_response()
}

async fn send_current(socket: &mut WebSocket, state: &AppState, topics: &[Topic]) -> bool {
    for &topic in topics {
        let event = state.current(topic);
        if !send_event(socket, &event).await {
            return false;
        }
    }
    true
}

async fn send_event(socket: &mut WebSocket, event: &SnapshotEvent) -> bool {
    socket
        .send(Message::Text(event.payload.as_ref().to_owned()))
        .await
        .is_ok()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, topics: Vec<Topic>) {
    // Subscribe before the initial snapshots so nothing committed in between
    // is missed.
    let mut rx = state.subscribe();
    tracing::debug!(collections = ?topics, "Stream subscriber connected");

    if !send_current(&mut socket, &state, &topics).await {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if !topics.contains(&event.collection) {
                            continue;
                        }
                        if !send_event(&mut socket, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Resync with the latest state instead of replaying.
                        tracing::debug!(missed, "Stream subscriber lagged");
                        if !send_current(&mut socket, &state, &topics).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
    tracing::debug!("Stream subscriber disconnected");
}
