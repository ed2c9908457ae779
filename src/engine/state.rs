//! Connection state of the supervised engine.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state as seen by observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionState {
    /// No engine process.
    #[default]
    Disconnected = 0,
    /// Engine running and confirmed alive.
    Connected = 1,
    /// Teardown in progress.
    Disconnecting = 2,
}

impl ConnectionState {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single authoritative copy of the state, readable from any task.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Cell starting at `disconnected`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Replace the state, returning the previous one.
    pub fn store(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }
}
