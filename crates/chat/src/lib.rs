//! Chat orchestration on top of the Room Manager's per-room FIFO (spec §3,
//! §4.3). Owns message-length validation, rate-limit enforcement, and the
//! rolling `room:<id>:messages:<limit>` history caches; delivery fan-out is
//! the gateway's job via the returned `Notify` list.

pub mod error;
pub mod service;

pub use {
    error::{Error, Result},
    service::{ChatService, HISTORY_LIMITS, MAX_MESSAGE_LEN, RoomChatService},
};
