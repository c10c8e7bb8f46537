//! Store Gateway: a typed façade over a distributed KV store with pub/sub
//! (spec §4.1). Every other crate that needs shared state or cross-server
//! events goes through this crate rather than talking to Redis directly.

pub mod client;
pub mod codec;
pub mod error;

pub use {
    client::{StoreGateway, StoreMessage},
    error::{Error, Result},
};
