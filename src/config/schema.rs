//! Settings schema definitions.
//!
//! Every field has a default, so an empty or partial settings file is valid.
//! Durations are stored as integer milliseconds to keep the TOML readable.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::error::ConfigError;

/// Default engine binary name (without platform executable suffix).
pub const DEFAULT_ENGINE_BINARY: &str = "mihomo";

/// Default engine log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "logs/mihomo.log";

/// Default controller host used until the engine config says otherwise.
pub const DEFAULT_CONTROLLER_HOST: &str = "127.0.0.1";

/// Default controller port used until the engine config says otherwise.
pub const DEFAULT_CONTROLLER_PORT: u16 = 9090;

/// Top-level settings structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Engine executable and log location.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Lifecycle timings.
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Control API defaults.
    #[serde(default)]
    pub controller: ControllerSettings,
}

impl Settings {
    /// Merge another settings layer into this one.
    ///
    /// Scalars are overridden when the other layer holds a non-default value.
    pub fn merge(&mut self, other: Settings) {
        self.engine.merge(other.engine);
        self.supervisor.merge(other.supervisor);
        self.controller.merge(other.controller);
    }

    /// Reject values that would make the supervisor misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.binary.trim().is_empty() {
            return Err(invalid("engine.binary", "must not be empty"));
        }
        if self.supervisor.poll_interval_ms == 0 {
            return Err(invalid("supervisor.poll_interval_ms", "must be greater than zero"));
        }
        if self.supervisor.stop_timeout_ms == 0 {
            return Err(invalid("supervisor.stop_timeout_ms", "must be greater than zero"));
        }
        if self.controller.request_timeout_ms == 0 {
            return Err(invalid("controller.request_timeout_ms", "must be greater than zero"));
        }
        if self.controller.port == 0 {
            return Err(invalid("controller.port", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Engine executable settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Engine binary name inside the working directory.
    ///
    /// The platform executable suffix (`.exe` on Windows) is appended.
    pub binary: String,

    /// Engine log file, relative to the working directory.
    pub log_file: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_ENGINE_BINARY.to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl EngineSettings {
    /// File name of the engine executable on this platform.
    pub fn executable_name(&self) -> String {
        format!("{}{}", self.binary, std::env::consts::EXE_SUFFIX)
    }

    fn merge(&mut self, other: EngineSettings) {
        let defaults = EngineSettings::default();
        if other.binary != defaults.binary {
            self.binary = other.binary;
        }
        if other.log_file != defaults.log_file {
            self.log_file = other.log_file;
        }
    }
}

/// Lifecycle timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// How long to wait after spawning before checking the engine survived.
    pub startup_grace_ms: u64,

    /// Upper bound on waiting for the engine to exit after it is killed.
    pub stop_timeout_ms: u64,

    /// Traffic polling interval.
    pub poll_interval_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            startup_grace_ms: 500,
            stop_timeout_ms: 3000,
            poll_interval_ms: 1000,
        }
    }
}

impl SupervisorSettings {
    /// Startup grace period.
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    /// Stop timeout.
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Traffic polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn merge(&mut self, other: SupervisorSettings) {
        let defaults = SupervisorSettings::default();
        if other.startup_grace_ms != defaults.startup_grace_ms {
            self.startup_grace_ms = other.startup_grace_ms;
        }
        if other.stop_timeout_ms != defaults.stop_timeout_ms {
            self.stop_timeout_ms = other.stop_timeout_ms;
        }
        if other.poll_interval_ms != defaults.poll_interval_ms {
            self.poll_interval_ms = other.poll_interval_ms;
        }
    }
}

/// Control API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Host used before the engine config has been parsed.
    pub host: String,

    /// Port used before the engine config has been parsed.
    pub port: u16,

    /// Upper bound on a single control API request.
    pub request_timeout_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_CONTROLLER_HOST.to_string(),
            port: DEFAULT_CONTROLLER_PORT,
            request_timeout_ms: 5000,
        }
    }
}

impl ControllerSettings {
    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn merge(&mut self, other: ControllerSettings) {
        let defaults = ControllerSettings::default();
        if other.host != defaults.host {
            self.host = other.host;
        }
        if other.port != defaults.port {
            self.port = other.port;
        }
        if other.request_timeout_ms != defaults.request_timeout_ms {
            self.request_timeout_ms = other.request_timeout_ms;
        }
    }
}
