//! Engine event types.
//!
//! Events carry what observers are told: state transitions, traffic samples,
//! engine log lines and error messages.

use serde::Serialize;
use serde_json::Value;

use super::rate::TrafficStats;
use crate::engine::ConnectionState;

/// An observable engine event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Connection state changed.
    #[serde(rename = "vpn_state_changed")]
    StateChanged(ConnectionState),

    /// New traffic sample with rates.
    #[serde(rename = "traffic_update")]
    Traffic(TrafficStats),

    /// A line of engine output.
    Log(String),

    /// Something went wrong in the supervisor.
    Error(String),
}

impl EngineEvent {
    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged(_) => "vpn_state_changed",
            EngineEvent::Traffic(_) => "traffic_update",
            EngineEvent::Log(_) => "log",
            EngineEvent::Error(_) => "error",
        }
    }

    /// Event payload as JSON.
    pub fn data(&self) -> Value {
        match self {
            EngineEvent::StateChanged(state) => Value::String(state.as_str().to_string()),
            EngineEvent::Traffic(stats) => serde_json::to_value(stats).unwrap_or(Value::Null),
            EngineEvent::Log(line) => Value::String(line.clone()),
            EngineEvent::Error(message) => Value::String(message.clone()),
        }
    }
}
