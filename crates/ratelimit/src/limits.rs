//! Per-tier limit table (spec §4.8).

use std::time::Duration;

use streamhub_common::types::UserTier;
use streamhub_config::RateLimitOverrides;

#[derive(Debug, Clone, Copy)]
pub struct TierLimit {
    pub per_sec: u32,
    pub per_min: u32,
    pub per_hour: u32,
    pub burst: u32,
    pub max_conns: u32,
}

pub fn limit_for(tier: UserTier) -> TierLimit {
    match tier {
        UserTier::Anonymous => TierLimit { per_sec: 2, per_min: 60, per_hour: 500, burst: 5, max_conns: 1 },
        UserTier::Viewer => TierLimit { per_sec: 5, per_min: 200, per_hour: 2_000, burst: 10, max_conns: 3 },
        UserTier::PremiumViewer => TierLimit { per_sec: 10, per_min: 400, per_hour: 5_000, burst: 20, max_conns: 10 },
        UserTier::Moderator => TierLimit { per_sec: 25, per_min: 800, per_hour: 10_000, burst: 50, max_conns: 5 },
        UserTier::Streamer => TierLimit { per_sec: 50, per_min: 1_000, per_hour: 20_000, burst: 100, max_conns: 1 },
    }
}

/// Apply file/env overrides (spec §6.4) on top of the built-in table. Only
/// the per-second message budget and its window are overridable today —
/// everything else keeps the built-in per-tier shape.
pub fn apply_overrides(mut limit: TierLimit, overrides: &RateLimitOverrides) -> TierLimit {
    if let Some(messages) = overrides.messages_per_window {
        limit.per_sec = messages;
    }
    limit
}

pub const WINDOW_SEC: Duration = Duration::from_secs(1);
pub const WINDOW_MIN: Duration = Duration::from_secs(60);
pub const WINDOW_HOUR: Duration = Duration::from_secs(3_600);
