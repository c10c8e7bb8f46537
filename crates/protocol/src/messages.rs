//! Client/server message catalogue (spec §6), encoded as tagged JSON.

use serde::{Deserialize, Serialize};

use crate::ErrorShape;

/// A client-reported WebRTC session description (offer or answer), passed
/// through verbatim — the hub never inspects SDP content.
pub type SessionDescription = serde_json::Value;
/// A client-reported ICE candidate, passed through verbatim.
pub type IceCandidatePayload = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionHealthStatus {
    Healthy,
    Failing,
    Lost,
}

/// A chat message as delivered to clients (outbound shape); also the
/// in-memory representation kept in a room's bounded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub id: u64,
    pub username: String,
    pub message: String,
    pub timestamp: u64,
    #[serde(rename = "isSystem")]
    pub is_system: bool,
    #[serde(rename = "isStreamer")]
    pub is_streamer: bool,
}

/// Inbound (client → server) messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: String,
        username: String,
        #[serde(rename = "isStreamer", default)]
        is_streamer: bool,
    },
    LeaveRoom,
    ChatMessage {
        #[serde(rename = "roomId")]
        room_id: String,
        message: String,
    },
    UpdateAutoAccept {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "autoAccept")]
        auto_accept: bool,
    },
    AcceptUser {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    RejectUser {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    AcceptAll {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    RejectAll {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    Offer {
        offer: SessionDescription,
        #[serde(rename = "roomId")]
        room_id: String,
        timestamp: Option<u64>,
    },
    Answer {
        answer: SessionDescription,
        #[serde(rename = "streamerId")]
        streamer_id: String,
        timestamp: Option<u64>,
    },
    IceCandidate {
        candidate: IceCandidatePayload,
        #[serde(rename = "roomId")]
        room_id: Option<String>,
        #[serde(rename = "targetId")]
        target_id: Option<String>,
        timestamp: Option<u64>,
    },
    ConnectionHealth {
        status: ConnectionHealthStatus,
        details: Option<serde_json::Value>,
    },
}

/// Outbound (server → client) messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomInfo {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "viewerCount")]
        viewer_count: u32,
        messages: Vec<ChatPayload>,
    },
    StreamerStatus {
        #[serde(rename = "isStreamer")]
        is_streamer: bool,
        error: Option<String>,
    },
    WaitingApproval,
    JoinRequest {
        #[serde(rename = "userId")]
        user_id: String,
        username: String,
    },
    JoinAccepted,
    JoinRejected {
        reason: Option<String>,
    },
    UserJoined {
        username: String,
        #[serde(rename = "viewerCount")]
        viewer_count: u32,
    },
    UserLeft {
        username: String,
        #[serde(rename = "viewerCount")]
        viewer_count: u32,
        #[serde(rename = "isStreamer")]
        is_streamer: bool,
    },
    ChatMessage(ChatPayload),
    Offer {
        offer: SessionDescription,
        #[serde(rename = "streamerId")]
        streamer_id: String,
        timestamp: u64,
    },
    Answer {
        answer: SessionDescription,
        #[serde(rename = "viewerId")]
        viewer_id: String,
        timestamp: u64,
    },
    IceCandidate {
        candidate: IceCandidatePayload,
        #[serde(rename = "senderId")]
        sender_id: String,
        timestamp: u64,
    },
    StreamEnded {
        reason: String,
        message: String,
        #[serde(rename = "reconnectPossible")]
        reconnect_possible: bool,
    },
    Error(ErrorShape),
    RedirectServer {
        #[serde(rename = "targetServer")]
        target_server: String,
        #[serde(rename = "roomId")]
        room_id: String,
    },
    RoomNotFound,
    RoomFull,
    ViewerDisconnected {
        #[serde(rename = "userId")]
        user_id: String,
        status: ConnectionHealthStatus,
    },
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorShape::new(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_round_trips_through_json() {
        let msg = ClientMessage::JoinRoom {
            room_id: "ABC123".into(),
            username: "alice".into(),
            is_streamer: true,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join-room\""));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        match back {
            ClientMessage::JoinRoom {
                room_id,
                username,
                is_streamer,
            } => {
                assert_eq!(room_id, "ABC123");
                assert_eq!(username, "alice");
                assert!(is_streamer);
            },
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn user_joined_uses_camel_case_fields() {
        let msg = ServerMessage::UserJoined {
            username: "bob".into(),
            viewer_count: 2,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"viewerCount\":2"));
    }

    #[test]
    fn error_message_matches_error_codes() {
        let msg = ServerMessage::error(crate::error_codes::ROOM_FULL, "room is full");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "ROOM_FULL");
    }
}
