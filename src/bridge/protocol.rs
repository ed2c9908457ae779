//! Bridge message types.
//!
//! The bridge speaks newline-delimited JSON with the UI layer:
//!
//! ```text
//! ┌──────────────┐   BridgeRequest    ┌──────────────┐
//! │              │───────────────────>│              │
//! │   UI layer   │   BridgeResponse   │  vortex-core │
//! │              │<───────────────────│              │
//! │              │    BridgeEvent     │              │
//! │              │<───────────────────│              │
//! └──────────────┘                    └──────────────┘
//! ```
//!
//! Requests carry a caller-chosen `id` echoed in the response. Events are
//! unsolicited and carry an RFC 3339 timestamp.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::BridgeError;
use crate::telemetry::EngineEvent;

/// Probe URL used when `testProxyDelay` does not name one.
pub const DEFAULT_DELAY_URL: &str = "http://www.gstatic.com/generate_204";

/// Probe timeout used when `testProxyDelay` does not name one.
pub const DEFAULT_DELAY_TIMEOUT_MS: u64 = 5000;

/// Methods that belong to platform shells and have no meaning here.
pub const PLATFORM_METHODS: &[&str] = &[
    "setSystemProxy",
    "setAutoStart",
    "isAutoStartEnabled",
    "getDeviceInfo",
    "openAppSettings",
    "copyLogsToClipboard",
    "startVpn",
    "stopVpn",
    "requestVpnPermission",
    "checkBatteryOptimization",
    "requestIgnoreBatteryOptimization",
    "installSystemExtension",
    "checkSystemExtension",
];

/// A method call from the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// Caller-chosen correlation id.
    pub id: u64,
    /// Method name, e.g. `startCore`.
    pub method: String,
    /// Method arguments.
    #[serde(default)]
    pub args: Value,
}

/// A parsed, typed method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCall {
    /// Launch the engine with a config file.
    StartCore {
        /// Engine config to run.
        config_path: PathBuf,
    },
    /// Stop the engine.
    StopCore,
    /// Switch the running engine to another config file.
    ReloadConfig {
        /// New engine config.
        config_path: PathBuf,
    },
    /// Whether the engine process is alive.
    IsCoreRunning,
    /// Engine version string.
    GetCoreVersion,
    /// Current connection state.
    GetVpnState,
    /// Cumulative counters with zero rates.
    GetTrafficStats,
    /// Latency probe through a proxy.
    TestProxyDelay {
        /// Proxy name.
        proxy: String,
        /// URL to probe.
        url: String,
        /// Probe timeout in milliseconds.
        timeout: u64,
    },
    /// Select a proxy in a selector group.
    SwitchProxy {
        /// Selector group name.
        selector: String,
        /// Proxy to select.
        proxy: String,
    },
    /// Raw connections snapshot.
    GetConnections,
    /// Engine log file contents.
    GetLogs,
    /// Write the engine log to a timestamped file.
    ExportLogs,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigArgs {
    config_path: PathBuf,
}

#[derive(Deserialize)]
struct DelayArgs {
    proxy: String,
    #[serde(default = "default_delay_url")]
    url: String,
    #[serde(default = "default_delay_timeout")]
    timeout: u64,
}

#[derive(Deserialize)]
struct SwitchArgs {
    selector: String,
    proxy: String,
}

fn default_delay_url() -> String {
    DEFAULT_DELAY_URL.to_string()
}

fn default_delay_timeout() -> u64 {
    DEFAULT_DELAY_TIMEOUT_MS
}

impl MethodCall {
    /// Resolve a method name and its arguments.
    pub fn parse(method: &str, args: &Value) -> Result<Self, BridgeError> {
        let call = match method {
            "startCore" => {
                let ConfigArgs { config_path } = typed_args(method, args)?;
                MethodCall::StartCore { config_path }
            }
            "stopCore" => MethodCall::StopCore,
            "reloadConfig" => {
                let ConfigArgs { config_path } = typed_args(method, args)?;
                MethodCall::ReloadConfig { config_path }
            }
            "isCoreRunning" => MethodCall::IsCoreRunning,
            "getCoreVersion" => MethodCall::GetCoreVersion,
            "getVpnState" => MethodCall::GetVpnState,
            "getTrafficStats" => MethodCall::GetTrafficStats,
            "testProxyDelay" => {
                let DelayArgs {
                    proxy,
                    url,
                    timeout,
                } = typed_args(method, args)?;
                MethodCall::TestProxyDelay {
                    proxy,
                    url,
                    timeout,
                }
            }
            "switchProxy" => {
                let SwitchArgs { selector, proxy } = typed_args(method, args)?;
                MethodCall::SwitchProxy { selector, proxy }
            }
            "getConnections" => MethodCall::GetConnections,
            "getLogs" => MethodCall::GetLogs,
            "exportLogs" => MethodCall::ExportLogs,
            other if PLATFORM_METHODS.contains(&other) => {
                return Err(BridgeError::NotSupported(other.to_string()));
            }
            other => return Err(BridgeError::UnknownMethod(other.to_string())),
        };
        Ok(call)
    }
}

fn typed_args<T: DeserializeOwned>(method: &str, args: &Value) -> Result<T, BridgeError> {
    T::deserialize(args).map_err(|source| BridgeError::InvalidArgs {
        method: method.to_string(),
        source,
    })
}

/// Error payload of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Reply to a [`BridgeRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    /// Echoed request id.
    pub id: u64,
    /// Whether the call was dispatched.
    pub ok: bool,
    /// Method result when `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure details when not `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl BridgeResponse {
    /// Successful reply.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed reply.
    pub fn failure(id: u64, err: &BridgeError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// Unsolicited notification to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEvent {
    /// `vpn_state_changed`, `traffic_update`, `log` or `error`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload.
    pub data: Value,
    /// When the event was framed.
    pub ts: DateTime<Utc>,
}

impl From<&EngineEvent> for BridgeEvent {
    fn from(event: &EngineEvent) -> Self {
        Self {
            kind: event.kind().to_string(),
            data: event.data(),
            ts: Utc::now(),
        }
    }
}
