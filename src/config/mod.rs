//! Settings for vortex-core.
//!
//! This module provides TOML settings loading with layer merging. Settings hold
//! the tunables of the supervisor (engine binary name, log location, timings and
//! control API defaults). They are distinct from the engine's own YAML config,
//! which is opaque apart from the controller fields resolved in
//! [`crate::controller::endpoint`].
//!
//! # Example
//!
//! ```toml
//! [engine]
//! binary = "mihomo"
//! log_file = "logs/mihomo.log"
//!
//! [supervisor]
//! startup_grace_ms = 500
//! stop_timeout_ms = 3000
//! poll_interval_ms = 1000
//!
//! [controller]
//! host = "127.0.0.1"
//! port = 9090
//! request_timeout_ms = 5000
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{SettingsLoader, USER_SETTINGS_DIR, USER_SETTINGS_FILE};
pub use schema::{
    ControllerSettings, EngineSettings, Settings, SupervisorSettings, DEFAULT_CONTROLLER_HOST,
    DEFAULT_CONTROLLER_PORT, DEFAULT_ENGINE_BINARY, DEFAULT_LOG_FILE,
};
