//! A single WebSocket connection's lifecycle: register → message loop →
//! cascade cleanup (spec §4.6). There is no separate handshake request in
//! this protocol — a peer is live the moment the upgrade completes, and its
//! first frame is ordinarily `join-room`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use streamhub_common::types::{PeerId, UserTier};
use streamhub_protocol::{MAX_PAYLOAD_BYTES, OutboundFrame, ServerMessage, error_codes};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch;
use crate::state::GatewayState;

pub async fn handle_connection(mut socket: WebSocket, state: Arc<GatewayState>, remote_addr: SocketAddr) {
    let peer_id = uuid::Uuid::new_v4().to_string();
    let remote_ip = remote_addr.ip().to_string();

    // Every socket starts anonymous; that tier's `max_conns` is the only cap
    // enforceable before a peer has joined a room.
    if !state.limiter.try_acquire_connection(&remote_ip, UserTier::Anonymous) {
        warn!(remote_ip = %remote_ip, "ws: connection limit reached, refusing socket");
        reject(socket, error_codes::CONNECTION_LIMIT, "connection limit reached for this tier").await;
        return;
    }

    if state.sessions.count() as u32 >= state.config.max_connections {
        warn!(remote_ip = %remote_ip, "ws: instance connection cap reached, refusing socket");
        state.limiter.release_connection(&remote_ip);
        reject(socket, error_codes::CONNECTION_LIMIT, "server has reached its connection limit").await;
        return;
    }

    info!(peer_id = %peer_id, remote_ip = %remote_ip, "ws: connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();

    let write_peer_id = peer_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let message = match frame {
                OutboundFrame::Json(server_message) => match serde_json::to_string(&server_message) {
                    Ok(text) => Message::Text(text.into()),
                    Err(error) => {
                        warn!(%error, peer_id = %write_peer_id, "ws: failed to encode outbound frame");
                        continue;
                    },
                },
                OutboundFrame::Binary(bytes) => Message::Binary(bytes.into()),
            };
            if ws_tx.send(message).await.is_err() {
                debug!(peer_id = %write_peer_id, "ws: write loop closed");
                break;
            }
        }
    });

    let session = streamhub_sessions::ConnectionSession::new(peer_id.clone(), Some(remote_ip.clone()), outbound_tx.clone());
    state.sessions.register(session);

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Binary(_)) => continue,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(error) => {
                debug!(%error, peer_id = %peer_id, "ws: read error");
                break;
            },
        };

        if text.len() > MAX_PAYLOAD_BYTES {
            let _ = outbound_tx.send(OutboundFrame::Json(ServerMessage::error(
                error_codes::INVALID_REQUEST,
                format!("payload exceeds {MAX_PAYLOAD_BYTES} bytes"),
            )));
            continue;
        }

        let message = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(error) => {
                debug!(%error, peer_id = %peer_id, "ws: malformed frame");
                let _ = outbound_tx.send(OutboundFrame::Json(ServerMessage::error(error_codes::INVALID_REQUEST, "malformed frame")));
                continue;
            },
        };

        dispatch::handle(&state, &peer_id, &remote_ip, message).await;
    }

    cleanup(&state, &peer_id, &remote_ip).await;
    drop(outbound_tx);
    write_handle.abort();
    info!(peer_id = %peer_id, "ws: connection closed");
}

/// Send a single error frame to a socket that is being refused before
/// registration, then let it drop — there is no session to clean up yet.
async fn reject(mut socket: WebSocket, code: &str, message: &str) {
    let frame = ServerMessage::error(code, message);
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = socket.send(Message::Text(text.into())).await;
    }
}

/// Five-step disconnect cascade: leave any joined room, unregister the
/// session, forget rate-limit state, and release the connection slot.
async fn cleanup(state: &GatewayState, peer_id: &PeerId, remote_ip: &str) {
    if let Some(room_id) = state.sessions.get(peer_id).and_then(|s| s.room_id) {
        if let Ok(notify) = state.rooms.leave(peer_id, &room_id).await {
            dispatch::fanout(state, notify);
        }
    }
    state.sessions.unregister(peer_id);
    state.limiter.forget_peer(peer_id);
    state.limiter.release_connection(remote_ip);
}
