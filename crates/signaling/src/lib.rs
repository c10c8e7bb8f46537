//! Signaling Relay: offer/answer/ICE routing with targeting and
//! connection-health bookkeeping (spec §4.5).

pub mod error;
pub mod relay;

pub use {
    error::{Error, Result},
    relay::SignalingRelay,
};
