//! Consistent-hash shard routing (spec §4.4).

use std::io::Cursor;

use streamhub_common::types::{RoomId, ServerId};
use streamhub_config::ShardRange;

const HASH_SEED: u32 = 0;

/// Stable 32-bit hash of a room id, fixed fleet-wide (MurmurHash3).
pub fn shard_hash(room_id: &RoomId) -> u32 {
    murmur3::murmur3_32(&mut Cursor::new(room_id.as_bytes()), HASH_SEED)
        .expect("hashing an in-memory buffer cannot fail")
}

/// Which shard a room belongs to, given the fleet's total shard count.
pub fn shard_for_room(room_id: &RoomId, shard_count: u32) -> u32 {
    shard_hash(room_id) % shard_count.max(1)
}

/// A fleet member's advertised shard ownership, as seen on the last
/// heartbeat within the active-server window (spec §4.2).
#[derive(Debug, Clone)]
pub struct ServerShardInfo {
    pub server_id: ServerId,
    pub range: ShardRange,
}

/// Outcome of routing a room id to the instance that owns its shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// This instance owns the room's shard; handle it locally.
    Local,
    /// Another active instance owns the shard.
    Redirect(ServerId),
    /// No active instance currently claims the shard (empty-active-set
    /// degradation, spec §4.4) — never silently fall back to local.
    Unavailable,
}

/// Resolves room ids to the instance owning their shard.
pub struct ShardRouter {
    owned_range: ShardRange,
    shard_count: u32,
}

impl ShardRouter {
    /// `shard_count = 1` degenerates every lookup to `Local` (spec Open
    /// Question #1's single-shard mode).
    pub fn new(owned_range: ShardRange, shard_count: u32) -> Self {
        Self {
            owned_range,
            shard_count: shard_count.max(1),
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Route `room_id`, consulting `active_servers` (the bus's heartbeat-derived
    /// active set) when the shard falls outside this instance's owned range.
    pub fn resolve(&self, room_id: &RoomId, active_servers: &[ServerShardInfo]) -> RouteDecision {
        let shard = shard_for_room(room_id, self.shard_count);

        if self.owned_range.contains(shard) {
            return RouteDecision::Local;
        }

        match active_servers.iter().find(|s| s.range.contains(shard)) {
            Some(owner) => RouteDecision::Redirect(owner.server_id.clone()),
            None => RouteDecision::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shard_mode_is_always_local() {
        let router = ShardRouter::new(ShardRange { start: 0, end: 0 }, 1);
        let decision = router.resolve(&"any-room".to_string(), &[]);
        assert_eq!(decision, RouteDecision::Local);
    }

    #[test]
    fn out_of_range_room_redirects_to_owner() {
        let router = ShardRouter::new(ShardRange { start: 0, end: 499 }, 1000);
        let room = "room-needing-other-shard".to_string();
        let shard = shard_for_room(&room, 1000);
        assert!(shard >= 500, "test room must hash outside the owned range");

        let owner = ServerShardInfo {
            server_id: "node-b".to_string(),
            range: ShardRange { start: 500, end: 999 },
        };
        let decision = router.resolve(&room, std::slice::from_ref(&owner));
        assert_eq!(decision, RouteDecision::Redirect("node-b".to_string()));
    }

    #[test]
    fn out_of_range_with_no_owner_is_unavailable() {
        let router = ShardRouter::new(ShardRange { start: 0, end: 0 }, 1000);
        let room = "some-room".to_string();
        if shard_for_room(&room, 1000) == 0 {
            return; // degenerate hash collision, not worth asserting on
        }
        assert_eq!(router.resolve(&room, &[]), RouteDecision::Unavailable);
    }

    #[test]
    fn hash_is_stable_across_calls() {
        let room = "stable-room-id".to_string();
        assert_eq!(shard_hash(&room), shard_hash(&room));
    }
}
