//! Engine control API: endpoint resolution and HTTP client.
//!
//! The engine exposes a small REST API on a local port (`external-controller`
//! in its YAML config). This module resolves where that API lives and wraps
//! the handful of calls the supervisor needs.

pub mod api;
pub mod client;
pub mod endpoint;
pub mod error;

pub use api::{TrafficCounters, DELAY_UNAVAILABLE, UNKNOWN_VERSION};
pub use client::ControlClient;
pub use endpoint::ControllerEndpoint;
pub use error::ControlError;
