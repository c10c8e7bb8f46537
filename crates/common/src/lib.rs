//! Shared types, error definitions, and utilities used across every
//! `streamhub-*` crate.

pub mod error;
pub mod types;

pub use error::{Error, FromMessage, Result, StreamhubError};
