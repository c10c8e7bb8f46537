//! Per-message-kind weight and cooldown (spec §4.8).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Offer,
    Answer,
    IceCandidate,
    ChatMessage,
    JoinRoom,
    Other,
}

impl MessageKind {
    /// Weight counted against the sliding windows.
    pub fn weight(self) -> f64 {
        match self {
            Self::Offer | Self::Answer => 5.0,
            Self::IceCandidate => 0.1,
            Self::ChatMessage => 1.0,
            Self::JoinRoom => 2.0,
            Self::Other => 1.0,
        }
    }

    /// Minimum time between consecutive messages of this kind from one peer.
    pub fn cooldown(self) -> Duration {
        match self {
            Self::Offer | Self::Answer => Duration::from_secs(1),
            _ => Duration::ZERO,
        }
    }
}
