//! Bus event payloads and the envelope every published message carries
//! (spec §4.2: `{serverId, timestamp, type, …}`).

use serde::{Deserialize, Serialize};
use streamhub_common::types::{PeerId, RoomId, ServerId};

/// Message types dispatched on the bus, tagged by `type` exactly as
/// spec §4.2 names them (`room:created`, `user:joined`, `webrtc:offer`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    #[serde(rename = "room:created")]
    RoomCreated { room_id: RoomId },
    #[serde(rename = "room:closed")]
    RoomClosed { room_id: RoomId },
    #[serde(rename = "user:joined")]
    UserJoined {
        room_id: RoomId,
        peer_id: PeerId,
        username: String,
    },
    #[serde(rename = "user:left")]
    UserLeft { room_id: RoomId, peer_id: PeerId },
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer {
        room_id: RoomId,
        from: PeerId,
        to: PeerId,
        sdp: String,
    },
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer {
        room_id: RoomId,
        from: PeerId,
        to: PeerId,
        sdp: String,
    },
    #[serde(rename = "webrtc:ice-candidate")]
    WebrtcIceCandidate {
        room_id: RoomId,
        from: PeerId,
        to: PeerId,
        candidate: String,
    },
    #[serde(rename = "chat:message")]
    ChatMessage {
        room_id: RoomId,
        peer_id: PeerId,
        username: String,
        text: String,
    },
    #[serde(rename = "stream:ended")]
    StreamEnded { room_id: RoomId, reason: String },
    #[serde(rename = "health:heartbeat")]
    Heartbeat {
        server_id: ServerId,
        shard_start: u32,
        shard_end: u32,
    },
}

/// Envelope wrapping every published [`BusEvent`]. `server_id` lets a
/// receiver discard its own messages to avoid echo (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub server_id: ServerId,
    pub timestamp: u64,
    #[serde(flatten)]
    pub event: BusEvent,
}
