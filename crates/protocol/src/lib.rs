//! Wire protocol for the signaling and coordination hub.
//!
//! Frame types:
//! - `ClientMessage` — client → server inbound frame
//! - `ServerMessage`  — server → client outbound frame
//!
//! The JSON form (this module) is the default on-wire encoding; [`binary`]
//! is the optional compressed mirror for chat and ICE payloads.

pub mod binary;
pub mod messages;

pub use messages::{ChatPayload, ClientMessage, ConnectionHealthStatus, IceCandidatePayload, ServerMessage, SessionDescription};

pub type OutboundSender = tokio::sync::mpsc::UnboundedSender<OutboundFrame>;
pub type OutboundReceiver = tokio::sync::mpsc::UnboundedReceiver<OutboundFrame>;

// ── Constants ────────────────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PAYLOAD_BYTES: usize = 524_288; // 512 KiB
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000; // 10s
pub const TICK_INTERVAL_MS: u64 = 30_000; // 30s room-manager tick

pub const CHAT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_MAX_VIEWERS: u32 = 1000;
pub const DEFAULT_ROOM_ID_LEN: usize = 6;
pub const PENDING_APPROVAL_TIMEOUT_MS: u64 = 60_000;

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    // Validation
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INVALID_ROOM_ID: &str = "INVALID_ROOM_ID";
    pub const INVALID_USERNAME: &str = "INVALID_USERNAME";
    pub const MESSAGE_TOO_LONG: &str = "MESSAGE_TOO_LONG";
    // Capacity
    pub const ROOM_FULL: &str = "ROOM_FULL";
    pub const CONNECTION_LIMIT: &str = "CONNECTION_LIMIT";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const IP_BANNED: &str = "IP_BANNED";
    // State
    pub const STREAMER_PRESENT: &str = "STREAMER_PRESENT";
    pub const NOT_STREAMER: &str = "NOT_STREAMER";
    pub const NOT_IN_ROOM: &str = "NOT_IN_ROOM";
    // Routing
    pub const REDIRECT_SERVER: &str = "REDIRECT_SERVER";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    // Infra
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const TIMEOUT: &str = "TIMEOUT";
}

/// Structured error payload attached to an `error` server message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(rename = "retryAfterMs", skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: None,
            retry_after_ms: None,
        }
    }

    pub fn retryable_after(mut self, ms: u64) -> Self {
        self.retryable = Some(true);
        self.retry_after_ms = Some(ms);
        self
    }
}

/// A message queued on a connection's write side. `Binary` carries an
/// already-encoded [`binary`] frame (used for chat/ICE payloads above the
/// compression threshold); `Json` is encoded to text at send time.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Json(ServerMessage),
    Binary(Vec<u8>),
}
