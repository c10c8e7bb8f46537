//! Fixed bus channels (spec §4.2).

/// The fleet-wide channel set. Fixed rather than freeform so every instance
/// agrees on what's published where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusChannel {
    RoomEvents,
    UserEvents,
    WebrtcSignaling,
    ChatMessages,
    SystemEvents,
    HealthChecks,
    LoadbalanceEvents,
}

impl BusChannel {
    pub fn topic(self, prefix: &str) -> String {
        format!("{prefix}:{}", self.suffix())
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::RoomEvents => "room:events",
            Self::UserEvents => "user:events",
            Self::WebrtcSignaling => "webrtc:signaling",
            Self::ChatMessages => "chat:messages",
            Self::SystemEvents => "system:events",
            Self::HealthChecks => "health:checks",
            Self::LoadbalanceEvents => "loadbalance:events",
        }
    }
}
