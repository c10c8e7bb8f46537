//! Connection session registry: the live `peer_id → ConnectionSession` table
//! backing rate-limit lookups, broadcast fan-out, and cascade cleanup on
//! disconnect (spec §4.6).

pub mod error;
pub mod registry;

pub use {
    error::{Error, Result},
    registry::{ConnectionSession, SessionRegistry},
};
