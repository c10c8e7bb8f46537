//! The WebSocket/HTTP edge (spec §2, §4, §6): terminates client connections,
//! dispatches their messages into the room/signaling/chat services, and
//! fans the resulting notifications back out.

pub mod dispatch;
pub mod error;
pub mod http;
pub mod server;
pub mod state;
pub mod tick;
pub mod ws;

pub use {error::Error, state::GatewayState};
