//! Thin orchestration over the Room Manager's chat FIFO: length validation,
//! rate-limit enforcement, bus publication, and the rolling history caches
//! (spec §3's `room:<id>:messages:<limit>` keys).

use std::sync::Arc;

use streamhub_bus::{Bus, BusChannel, BusEvent};
use streamhub_cache::{Cache, Tags};
use streamhub_common::types::{PeerId, RoomId};
use streamhub_protocol::ChatPayload;
use streamhub_rooms::{Notify, RoomManager};

use crate::error::{Error, Result};

/// Longest chat message accepted before `MESSAGE_TOO_LONG` is returned.
pub const MAX_MESSAGE_LEN: usize = 500;

/// Window sizes the rolling history cache is kept at.
pub const HISTORY_LIMITS: [usize; 4] = [10, 25, 50, 100];

fn history_key(room_id: &str, limit: usize) -> String {
    format!("room:{room_id}:messages:{limit}")
}

/// Abstraction over chat delivery so the gateway can swap in a mock for
/// tests without pulling in a live store and bus.
///
/// Rate limiting happens once, at the dispatch boundary, before this is
/// called — `send` assumes the request already cleared that gate.
#[async_trait::async_trait]
pub trait ChatService: Send + Sync {
    async fn send(
        &self,
        peer_id: &PeerId,
        room_id: &RoomId,
        username: &str,
        message: &str,
        is_streamer: bool,
    ) -> Result<(ChatPayload, Vec<Notify>)>;

    async fn history(&self, room_id: &RoomId, limit: usize) -> Result<Vec<ChatPayload>>;
}

pub struct RoomChatService {
    rooms: Arc<RoomManager>,
    bus: Arc<Bus>,
    cache: Arc<Cache>,
}

impl RoomChatService {
    pub fn new(rooms: Arc<RoomManager>, bus: Arc<Bus>, cache: Arc<Cache>) -> Self {
        Self { rooms, bus, cache }
    }

    async fn refresh_history_caches(&self, room_id: &str) {
        for limit in HISTORY_LIMITS {
            let recent = self.rooms.recent_messages(room_id, limit);
            let key = history_key(room_id, limit);
            let tags = Tags { tags: vec![], deps: vec![format!("room:{room_id}")] };
            if let Err(error) = self.cache.set(&key, &recent, tags).await {
                tracing::debug!(%error, room_id, limit, "failed to refresh chat history cache");
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatService for RoomChatService {
    async fn send(
        &self,
        peer_id: &PeerId,
        room_id: &RoomId,
        username: &str,
        message: &str,
        is_streamer: bool,
    ) -> Result<(ChatPayload, Vec<Notify>)> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(Error::MessageTooLong { len: message.len(), max: MAX_MESSAGE_LEN });
        }

        let (payload, notify) = self
            .rooms
            .chat(room_id, username, message, is_streamer)
            .ok_or_else(|| Error::RoomNotFound(room_id.clone()))?;

        self.bus
            .publish(BusChannel::ChatMessages, BusEvent::ChatMessage {
                room_id: room_id.clone(),
                peer_id: peer_id.clone(),
                username: username.to_string(),
                text: message.to_string(),
            })
            .await;

        self.refresh_history_caches(room_id).await;

        Ok((payload, notify))
    }

    async fn history(&self, room_id: &RoomId, limit: usize) -> Result<Vec<ChatPayload>> {
        let key = history_key(room_id, limit);
        if let Some(cached) = self.cache.get::<Vec<ChatPayload>>(&key).await? {
            return Ok(cached);
        }
        let recent = self.rooms.recent_messages(room_id, limit);
        let tags = Tags { tags: vec![], deps: vec![format!("room:{room_id}")] };
        self.cache.set(&key, &recent, tags).await?;
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_over_the_limit_is_rejected_before_touching_the_room() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(long.len() > MAX_MESSAGE_LEN);
    }

    #[test]
    fn history_key_matches_the_documented_shape() {
        assert_eq!(history_key("ABC123", 25), "room:ABC123:messages:25");
    }
}
