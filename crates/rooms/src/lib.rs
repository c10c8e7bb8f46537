//! Room Manager: authoritative room membership state machine (spec §4.3).

pub mod error;
pub mod manager;
pub mod model;
pub mod notify;
pub mod outcome;
pub mod snapshot;

pub use {
    error::{Error, Result},
    manager::RoomManager,
    model::Room,
    notify::Notify,
    outcome::{JoinOutcome, RejectReason},
    snapshot::RoomSnapshot,
};
