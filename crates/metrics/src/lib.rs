//! Metric name registry and Prometheus recorder for the hub.
//!
//! Every other crate records through the `metrics` facade macros using the
//! name constants exported here, so a single place documents what's
//! available on `/metrics`.
//!
//! ```rust,ignore
//! use streamhub_metrics::{counter, websocket};
//!
//! counter!(websocket::CONNECTIONS_TOTAL).increment(1);
//! ```
//!
//! # Features
//!
//! - `prometheus`: export metrics in Prometheus text format via `MetricsHandle::render`.

mod definitions;
mod recorder;

pub use definitions::*;
pub use recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics};

pub use metrics::{counter, gauge, histogram};
