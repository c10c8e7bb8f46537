use serde::{Deserialize, Serialize};

use crate::model::Room;

/// The subset of room state cached on the Store Gateway. Refreshed on every
/// mutation; TTL is 30 min per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub streamer_peer_id: Option<String>,
    pub streamer_username: Option<String>,
    pub viewer_count: u32,
    pub auto_accept: bool,
    pub max_viewers: u32,
    pub is_private: bool,
    pub total_viewers: u64,
    pub peak_viewers: u32,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.room_id.clone(),
            streamer_peer_id: room.streamer.as_ref().map(|s| s.peer_id.clone()),
            streamer_username: room.streamer.as_ref().map(|s| s.username.clone()),
            viewer_count: room.viewer_count(),
            auto_accept: room.settings.auto_accept,
            max_viewers: room.settings.max_viewers,
            is_private: room.settings.is_private,
            total_viewers: room.stats.total_viewers,
            peak_viewers: room.stats.peak_viewers,
        }
    }
}

pub const CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(30 * 60);
pub const STORE_DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);

pub fn store_key(room_id: &str) -> String {
    format!("room:{room_id}")
}
