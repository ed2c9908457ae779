//! Error types for bridge dispatch.

use thiserror::Error;

/// Errors that turn into a failed [`super::BridgeResponse`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The request line was not a valid request.
    #[error("Malformed request: {0}")]
    Malformed(#[source] serde_json::Error),

    /// No such method.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// The method exists only in platform shells.
    #[error("Method not supported on this platform: {0}")]
    NotSupported(String),

    /// The method's arguments did not match its schema.
    #[error("Invalid arguments for {method}: {source}")]
    InvalidArgs {
        /// Method whose arguments were rejected.
        method: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl BridgeError {
    /// Stable error code sent to the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Malformed(_) => "MALFORMED_REQUEST",
            BridgeError::UnknownMethod(_) => "UNKNOWN_METHOD",
            BridgeError::NotSupported(_) => "NOT_SUPPORTED",
            BridgeError::InvalidArgs { .. } => "INVALID_ARGS",
        }
    }
}
