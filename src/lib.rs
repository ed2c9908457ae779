//! vortex-core: supervisor and telemetry poller for a local proxy engine
//!
//! This crate launches the mihomo proxy engine as a child process, confirms it
//! is healthy, talks to it over its local HTTP control API, derives live
//! bandwidth rates from cumulative counters and tears the process down
//! cleanly. A JSON message bridge exposes all of it to a UI layer.
//!
//! # Architecture
//!
//! - **Config**: TOML settings for the supervisor's own tunables
//! - **Controller**: Control API endpoint resolution and HTTP client
//! - **Engine**: Process lifecycle and connection state machine
//! - **Telemetry**: Observer hub and background traffic poller
//! - **Bridge**: JSON-lines method dispatch and event stream for UI shells

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod bridge;
pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod controller;
pub mod engine;
pub mod telemetry;
