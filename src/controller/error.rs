//! Error types for control API calls.
//!
//! These errors never reach callers of the high-level query methods; the
//! client logs them and degrades to an empty or sentinel result. They are
//! public so the `try_*` variants can be used where the cause matters.

use std::time::Duration;
use thiserror::Error;

/// Errors from a single control API request.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Could not build the request (bad path or header value).
    #[error("Invalid control request: {0}")]
    InvalidRequest(String),

    /// TCP connection to the controller failed.
    #[error("Failed to connect to controller at {addr}: {source}")]
    Connect {
        /// The address we tried to connect to.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// HTTP protocol error.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Controller answered with a non-2xx status.
    #[error("Controller returned status {0}")]
    Status(http::StatusCode),

    /// The request did not complete in time.
    #[error("Control request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body was not the expected JSON.
    #[error("Failed to decode controller response: {0}")]
    Decode(#[from] serde_json::Error),
}
