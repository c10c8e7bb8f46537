//! Plain HTTP surface alongside the WebSocket upgrade (spec §6.3): health,
//! a room directory, Prometheus metrics, and a pass-through SFU stub.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::state::GatewayState;

pub async fn health(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": streamhub_common::types::now_ms(),
        "rooms": state.rooms.room_count(),
        "users": state.sessions.count(),
    }))
}

pub async fn rooms(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let rooms: Vec<Value> = state
        .rooms
        .room_ids()
        .into_iter()
        .filter_map(|room_id| state.rooms.snapshot(&room_id))
        .map(|snapshot| {
            json!({
                "roomId": snapshot.room_id,
                "streamerUsername": snapshot.streamer_username,
                "viewerCount": snapshot.viewer_count,
                "maxViewers": snapshot.max_viewers,
                "autoAccept": snapshot.auto_accept,
                "isPrivate": snapshot.is_private,
                "peakViewers": snapshot.peak_viewers,
            })
        })
        .collect();
    Json(json!({ "rooms": rooms }))
}

pub async fn metrics(State(state): State<Arc<GatewayState>>) -> String {
    state.metrics.render()
}

/// The SFU lives outside this crate's scope; this endpoint only proves the
/// route shape a real media server integration would slot into.
pub async fn rtp_capabilities(Path(room_id): Path<String>) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_IMPLEMENTED, Json(json!({ "roomId": room_id, "error": "sfu integration not implemented" })))
}
