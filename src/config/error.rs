//! Settings error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading supervisor settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a settings file.
    #[error("Failed to read settings file {path}: {source}")]
    ReadError {
        /// Path to the file that couldn't be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a TOML settings file.
    #[error("Failed to parse settings file {path}: {source}")]
    ParseError {
        /// Path to the file that couldn't be parsed.
        path: PathBuf,
        /// The underlying TOML parse error.
        source: toml::de::Error,
    },

    /// A settings value is invalid.
    #[error("Invalid settings value for {field}: {message}")]
    InvalidValue {
        /// The field name that has an invalid value.
        field: String,
        /// Description of why the value is invalid.
        message: String,
    },
}
