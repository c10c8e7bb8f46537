//! Gateway configuration schema (spec §6.4).

use serde::{Deserialize, Serialize};

/// Top-level configuration for one hub instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamhubConfig {
    /// TCP port the HTTP/WebSocket listener binds to.
    pub port: u16,
    /// This instance's identity on the cross-server bus (spec §4.2).
    pub server_id: String,
    /// Hard cap on concurrent WebSocket connections before new joins see
    /// `room-full`/`redirect-server`.
    pub max_connections: u32,
    /// Inclusive shard range this instance owns, `start-end` (spec §4.2).
    pub room_shard_range: ShardRange,
    /// Total number of shards in the ring. `1` degenerates the router to
    /// always resolving `Local` (spec Open Question #1).
    pub shard_count: u32,
    /// Allowed CORS origin(s) for the HTTP surface, comma-separated.
    pub cors_origin: String,
    /// Backing store connection URLs (redis://, one per replica), spec §4.1.
    pub store_urls: Vec<String>,
    pub throttle: ThrottleConfig,
    pub rate_limit: RateLimitOverrides,
}

impl Default for StreamhubConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            server_id: "streamhub-local".to_string(),
            max_connections: 10_000,
            room_shard_range: ShardRange { start: 0, end: 0 },
            shard_count: 1,
            cors_origin: "*".to_string(),
            store_urls: vec!["redis://127.0.0.1:6379".to_string()],
            throttle: ThrottleConfig::default(),
            rate_limit: RateLimitOverrides::default(),
        }
    }
}

/// Inclusive `start-end` shard ownership range, parsed from `ROOM_SHARD_RANGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRange {
    pub start: u32,
    pub end: u32,
}

impl ShardRange {
    pub fn contains(&self, shard: u32) -> bool {
        (self.start..=self.end).contains(&shard)
    }
}

impl std::str::FromStr for ShardRange {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| crate::error::Error::message(format!("invalid shard range: {s}")))?;
        let start: u32 = start.trim().parse().map_err(|_| {
            crate::error::Error::message(format!("invalid shard range start: {s}"))
        })?;
        let end: u32 = end
            .trim()
            .parse()
            .map_err(|_| crate::error::Error::message(format!("invalid shard range end: {s}")))?;
        Ok(Self { start, end })
    }
}

/// Adaptive throttle thresholds (spec §4.5's CPU/memory-driven multiplier).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// CPU utilization fraction (0.0-1.0) above which rate limits tighten.
    pub cpu_high_watermark: f32,
    /// Resident memory fraction (0.0-1.0) above which rate limits tighten.
    pub memory_high_watermark: f32,
    /// Multiplier applied to every rate-limit bucket's capacity once a
    /// watermark is crossed (spec §4.5, < 1.0 tightens, default halves).
    pub degraded_factor: f32,
    /// Seconds between adaptive-throttle re-evaluation ticks.
    pub check_interval_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            cpu_high_watermark: 0.85,
            memory_high_watermark: 0.85,
            degraded_factor: 0.5,
            check_interval_secs: 10,
        }
    }
}

/// Per-tier rate limit overrides, layered on top of the built-in table in
/// `streamhub-ratelimit` (spec §4.8). `None` keeps the built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitOverrides {
    pub messages_per_window: Option<u32>,
    pub window_secs: Option<u64>,
}
