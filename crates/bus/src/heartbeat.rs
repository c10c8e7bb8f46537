//! Self-health heartbeat and active-server derivation (spec §4.2): a
//! heartbeat is published every 30 s; a server counts as "active" if its
//! last heartbeat landed within the last 2 minutes.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use streamhub_common::types::ServerId;
use streamhub_routing::ServerShardInfo;
use streamhub_config::ShardRange;

pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const ACTIVE_WINDOW_SECS: u64 = 120;

struct SeenServer {
    range: ShardRange,
    last_seen: Instant,
}

/// Tracks the last heartbeat timestamp for every server seen on the bus.
pub struct ActiveServerTracker {
    seen: RwLock<HashMap<ServerId, SeenServer>>,
}

impl Default for ActiveServerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveServerTracker {
    pub fn new() -> Self {
        Self {
            seen: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_heartbeat(&self, server_id: ServerId, range: ShardRange) {
        self.seen
            .write()
            .expect("active server tracker lock poisoned")
            .insert(server_id, SeenServer { range, last_seen: Instant::now() });
    }

    /// Servers whose heartbeat is within the active window, as the shard
    /// ownership list the router consults for redirects (spec §4.4).
    pub fn active_servers(&self) -> Vec<ServerShardInfo> {
        let window = Duration::from_secs(ACTIVE_WINDOW_SECS);
        self.seen
            .read()
            .expect("active server tracker lock poisoned")
            .iter()
            .filter(|(_, s)| s.last_seen.elapsed() <= window)
            .map(|(server_id, s)| ServerShardInfo {
                server_id: server_id.clone(),
                range: s.range,
            })
            .collect()
    }

    /// Drop entries that have aged out, bounding memory in a long-running
    /// fleet with churn.
    pub fn prune(&self) {
        let window = Duration::from_secs(ACTIVE_WINDOW_SECS);
        self.seen
            .write()
            .expect("active server tracker lock poisoned")
            .retain(|_, s| s.last_seen.elapsed() <= window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_recorded_server_is_active() {
        let tracker = ActiveServerTracker::new();
        tracker.record_heartbeat("node-a".to_string(), ShardRange { start: 0, end: 99 });
        assert_eq!(tracker.active_servers().len(), 1);
    }
}
