//! Consistent-hash shard routing: maps a room id to the fleet instance that
//! owns it (spec §4.4), degrading to `Unavailable` rather than ever serving
//! a room outside this instance's range.

pub mod error;
pub mod shard;

pub use {
    error::{Error, Result},
    shard::{RouteDecision, ServerShardInfo, ShardRouter, shard_for_room, shard_hash},
};
