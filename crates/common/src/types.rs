//! Identifiers and small value types shared across every crate in the hub.

use serde::{Deserialize, Serialize};

/// A room identifier: a short opaque alphanumeric string (6 chars by
/// convention, spec §3), but callers should not assume a fixed length when
/// validating — only charset and a sane upper bound.
pub type RoomId = String;

/// A connection-scoped UUID identifying one peer (spec §3 "Peer / Connection
/// Session"). Distinct from `username`, which is self-declared and never
/// authenticated (spec §1 Non-goals).
pub type PeerId = String;

/// Identifies one hub instance in the fleet (spec §4.2).
pub type ServerId = String;

/// Milliseconds since the Unix epoch, as carried on every bus envelope and
/// relayed signaling message.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Role of a connection within a room at a point in time (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Anonymous,
    Streamer,
    Viewer,
    Pending,
}

/// Rate-limit tier driving the table in spec §4.8. Derived from
/// `userType`/role at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTier {
    Anonymous,
    Viewer,
    PremiumViewer,
    Moderator,
    Streamer,
}

/// Validate a room id against the spec's charset: alphanumeric, 1-32 chars.
pub fn is_valid_room_id(room_id: &str) -> bool {
    !room_id.is_empty()
        && room_id.len() <= 32
        && room_id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Validate a self-declared username: non-empty, printable, bounded length.
pub fn is_valid_username(username: &str) -> bool {
    let trimmed = username.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() <= 64
        && trimmed.chars().all(|c| !c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_validation() {
        assert!(is_valid_room_id("ABC123"));
        assert!(!is_valid_room_id(""));
        assert!(!is_valid_room_id("has space"));
        assert!(!is_valid_room_id(&"a".repeat(33)));
    }

    #[test]
    fn username_validation() {
        assert!(is_valid_username("alice"));
        assert!(!is_valid_username("   "));
        assert!(!is_valid_username("bad\u{0007}name"));
    }
}
