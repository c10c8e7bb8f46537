//! Sliding-window rate limiter (spec §4.8). Generalizes the fixed-window
//! `DashMap<Key, WindowState>` shape into three concurrently-tracked
//! windows (1s/1min/1h) per peer, plus per-kind cooldowns and an IP-level
//! strike/ban ladder for repeat offenders.

use std::{
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use streamhub_common::types::{PeerId, UserTier};
use streamhub_config::{RateLimitOverrides, ThrottleConfig};
use streamhub_metrics::{counter, gauge, ratelimit as ratelimit_metrics};

use crate::{
    limits::{self, TierLimit, WINDOW_HOUR, WINDOW_MIN, WINDOW_SEC},
    message_kind::MessageKind,
};

/// Consecutive limit violations from one IP before it is temporarily banned.
const STRIKES_BEFORE_BAN: u32 = 5;
const BAN_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allowed,
    Throttled { reason: &'static str, retry_after: Duration },
    Banned { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

struct PeerState {
    sec: crate::window::SlidingWindow,
    min: crate::window::SlidingWindow,
    hour: crate::window::SlidingWindow,
    last_by_kind: std::collections::HashMap<MessageKind, Instant>,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            sec: Default::default(),
            min: Default::default(),
            hour: Default::default(),
            last_by_kind: Default::default(),
        }
    }
}

#[derive(Default)]
struct IpState {
    strikes: AtomicU32,
    banned_until: std::sync::Mutex<Option<Instant>>,
}

pub struct RateLimiter {
    peers: DashMap<PeerId, PeerState>,
    ips: DashMap<String, IpState>,
    conns: DashMap<String, u32>,
    overrides: RateLimitOverrides,
    degraded: AtomicBool,
    degraded_factor: f64,
}

impl RateLimiter {
    pub fn new(overrides: RateLimitOverrides, throttle: &ThrottleConfig) -> Self {
        Self {
            peers: DashMap::new(),
            ips: DashMap::new(),
            conns: DashMap::new(),
            overrides,
            degraded: AtomicBool::new(false),
            degraded_factor: throttle.degraded_factor as f64,
        }
    }

    /// Flip the global degraded multiplier on or off. Driven by a CPU/memory
    /// watermark monitor outside this crate (spec §4.8 adaptive throttling).
    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }

    fn effective_limit(&self, tier: UserTier) -> TierLimit {
        let mut limit = limits::apply_overrides(limits::limit_for(tier), &self.overrides);
        if self.degraded.load(Ordering::Relaxed) {
            let f = self.degraded_factor;
            limit.per_sec = ((limit.per_sec as f64) * f).max(1.0) as u32;
            limit.per_min = ((limit.per_min as f64) * f).max(1.0) as u32;
            limit.per_hour = ((limit.per_hour as f64) * f).max(1.0) as u32;
            limit.burst = ((limit.burst as f64) * f) as u32;
        }
        limit
    }

    /// Admit a new connection from `ip` against `tier`'s `max_conns` (spec
    /// §4.8's "Max conns" column). Every socket is anonymous at connect time,
    /// so this is checked before any room join with `UserTier::Anonymous`.
    /// Callers must pair a successful acquire with [`Self::release_connection`]
    /// on disconnect.
    pub fn try_acquire_connection(&self, ip: &str, tier: UserTier) -> bool {
        let cap = self.effective_limit(tier).max_conns;
        let mut count = self.conns.entry(ip.to_string()).or_insert(0);
        if *count >= cap {
            false
        } else {
            *count += 1;
            true
        }
    }

    pub fn release_connection(&self, ip: &str) {
        if let Some(mut count) = self.conns.get_mut(ip) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn check(&self, peer_id: &PeerId, ip: &str, tier: UserTier, kind: MessageKind) -> Decision {
        counter!(ratelimit_metrics::CHECKS_TOTAL).increment(1);
        let now = Instant::now();

        if let Some(ip_state) = self.ips.get(ip) {
            let until = *ip_state.banned_until.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(until) = until {
                if now < until {
                    counter!(ratelimit_metrics::THROTTLED_TOTAL).increment(1);
                    return Decision::Banned { retry_after: until - now };
                }
            }
        }

        let limit = self.effective_limit(tier);
        let weight = kind.weight();
        let mut peer = self.peers.entry(peer_id.clone()).or_default();
        gauge!(ratelimit_metrics::BUCKETS_ACTIVE).set(self.peers.len() as f64);

        if let Some(&last) = peer.last_by_kind.get(&kind) {
            let cooldown = kind.cooldown();
            if cooldown > Duration::ZERO && now.duration_since(last) < cooldown {
                self.strike(ip);
                counter!(ratelimit_metrics::THROTTLED_TOTAL).increment(1);
                return Decision::Throttled {
                    reason: "cooldown",
                    retry_after: cooldown - now.duration_since(last),
                };
            }
        }

        // `burst` only widens the 1s window — it is a short-spike allowance,
        // not a standing increase to the per-minute/per-hour budgets.
        let checks = [
            (peer.sec.load(now, WINDOW_SEC), (limit.per_sec + limit.burst) as f64, "per_sec", WINDOW_SEC),
            (peer.min.load(now, WINDOW_MIN), limit.per_min as f64, "per_min", WINDOW_MIN),
            (peer.hour.load(now, WINDOW_HOUR), limit.per_hour as f64, "per_hour", WINDOW_HOUR),
        ];
        for (load, cap, reason, window) in checks {
            if load + weight > cap {
                drop(peer);
                self.strike(ip);
                counter!(ratelimit_metrics::THROTTLED_TOTAL).increment(1);
                return Decision::Throttled { reason, retry_after: window };
            }
        }

        peer.sec.record(now, weight);
        peer.min.record(now, weight);
        peer.hour.record(now, weight);
        peer.last_by_kind.insert(kind, now);
        Decision::Allowed
    }

    fn strike(&self, ip: &str) {
        let state = self.ips.entry(ip.to_string()).or_default();
        let strikes = state.strikes.fetch_add(1, Ordering::Relaxed) + 1;
        if strikes >= STRIKES_BEFORE_BAN {
            let mut until = state.banned_until.lock().unwrap_or_else(|e| e.into_inner());
            *until = Some(Instant::now() + BAN_DURATION);
            state.strikes.store(0, Ordering::Relaxed);
        }
    }

    /// Drop bookkeeping for a disconnected peer.
    pub fn forget_peer(&self, peer_id: &PeerId) {
        self.peers.remove(peer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitOverrides::default(), &ThrottleConfig::default())
    }

    #[test]
    fn anonymous_burst_of_offers_is_throttled_by_cooldown() {
        let limiter = limiter();
        let peer = "peer-1".to_string();
        assert!(limiter.check(&peer, "1.2.3.4", UserTier::Anonymous, MessageKind::Offer).is_allowed());
        let second = limiter.check(&peer, "1.2.3.4", UserTier::Anonymous, MessageKind::Offer);
        assert!(!second.is_allowed());
    }

    #[test]
    fn distinct_peers_get_independent_budgets() {
        let limiter = limiter();
        assert!(limiter.check(&"a".to_string(), "9.9.9.9", UserTier::Viewer, MessageKind::ChatMessage).is_allowed());
        assert!(limiter.check(&"b".to_string(), "9.9.9.9", UserTier::Viewer, MessageKind::ChatMessage).is_allowed());
    }

    #[test]
    fn repeated_violations_ban_the_ip() {
        let limiter = limiter();
        let ip = "5.5.5.5";
        for i in 0..STRIKES_BEFORE_BAN {
            let peer = format!("peer-{i}");
            limiter.check(&peer, ip, UserTier::Anonymous, MessageKind::Offer);
            limiter.check(&peer, ip, UserTier::Anonymous, MessageKind::Offer);
        }
        let decision = limiter.check(&"peer-last".to_string(), ip, UserTier::Anonymous, MessageKind::ChatMessage);
        assert!(matches!(decision, Decision::Banned { .. }));
    }

    #[test]
    fn degraded_mode_shrinks_the_effective_limit() {
        let limiter = limiter();
        limiter.set_degraded(true);
        let limit = limiter.effective_limit(UserTier::Streamer);
        assert_eq!(limit.per_sec, 25);
    }

    #[test]
    fn anonymous_burst_covers_transient_spike_above_per_sec() {
        let limiter = limiter();
        let peer = "peer-burst".to_string();
        // anonymous: per_sec=2, burst=5 -> first 7 chat messages admitted, the rest denied.
        let mut allowed = 0;
        for _ in 0..10 {
            if limiter.check(&peer, "1.1.1.1", UserTier::Anonymous, MessageKind::ChatMessage).is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 7);
    }

    #[test]
    fn connection_limit_is_enforced_per_tier_and_ip() {
        let limiter = limiter();
        assert!(limiter.try_acquire_connection("2.2.2.2", UserTier::Anonymous));
        assert!(!limiter.try_acquire_connection("2.2.2.2", UserTier::Anonymous));

        limiter.release_connection("2.2.2.2");
        assert!(limiter.try_acquire_connection("2.2.2.2", UserTier::Anonymous));
    }

    #[test]
    fn connection_limit_tracks_ips_independently() {
        let limiter = limiter();
        assert!(limiter.try_acquire_connection("3.3.3.3", UserTier::Viewer));
        assert!(limiter.try_acquire_connection("4.4.4.4", UserTier::Viewer));
    }
}
