//! Error types for engine lifecycle operations.
//!
//! The messages of the launch errors are what the error observer receives,
//! so UI layers can show them verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from supervisor lifecycle operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `start` was called before a successful `init`.
    #[error("Supervisor not initialized")]
    NotInitialized,

    /// `init` was called while the engine is running.
    #[error("Core process is already running")]
    AlreadyRunning,

    /// The engine executable is missing from the working directory.
    #[error("Core binary not found: {}", path.display())]
    EngineNotFound {
        /// Expected executable location.
        path: PathBuf,
    },

    /// The working directory could not be created.
    #[error("Failed to prepare working directory {}: {source}", path.display())]
    WorkDir {
        /// The working directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to create the process.
    #[error("Failed to start core process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The process died within the startup grace period.
    #[error("Core process exited immediately")]
    ExitedImmediately,

    /// The operation needs a running engine.
    #[error("Core process is not running")]
    NotRunning,

    /// The engine did not accept the new configuration.
    #[error("Engine rejected configuration {}", path.display())]
    ReloadRejected {
        /// The configuration that was offered.
        path: PathBuf,
    },
}
