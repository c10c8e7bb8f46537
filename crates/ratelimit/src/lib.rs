//! Sliding-window, tier-aware rate limiter for inbound signaling messages
//! (spec §4.8).

pub mod limits;
pub mod limiter;
pub mod message_kind;
mod window;

pub use {
    limits::{TierLimit, limit_for},
    limiter::{Decision, RateLimiter},
    message_kind::MessageKind,
};
