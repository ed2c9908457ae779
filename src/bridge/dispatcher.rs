//! Method dispatch onto the supervisor.
//!
//! Lifecycle calls take the supervisor lock. Queries go straight to the
//! control client and the shared state cell, so they still answer while a
//! start or stop is in progress.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::error::BridgeError;
use super::protocol::{BridgeRequest, BridgeResponse, MethodCall};
use crate::controller::ControlClient;
use crate::engine::{StateCell, Supervisor, NO_LOGS};
use crate::telemetry::{EngineEvent, NotificationHub, TrafficStats};

/// Routes bridge requests to a supervisor.
pub struct Bridge {
    supervisor: Mutex<Supervisor>,
    client: Arc<ControlClient>,
    hub: Arc<NotificationHub>,
    state: Arc<StateCell>,
}

impl Bridge {
    /// Wrap a supervisor.
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            client: supervisor.client().clone(),
            hub: supervisor.hub().clone(),
            state: supervisor.state_cell(),
            supervisor: Mutex::new(supervisor),
        }
    }

    /// Route every observer category into a fresh event channel.
    ///
    /// Replaces whatever observers were registered before.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.forward_to(tx);
        rx
    }

    /// Clear every observer, closing the channel from [`Bridge::attach`].
    pub fn detach(&self) {
        self.hub.clear();
    }

    /// Handle one raw request line.
    pub async fn handle_line(&self, line: &str) -> BridgeResponse {
        match serde_json::from_str::<BridgeRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!("Malformed bridge request: {}", e);
                let id = serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_u64))
                    .unwrap_or(0);
                BridgeResponse::failure(id, &BridgeError::Malformed(e))
            }
        }
    }

    /// Handle a parsed request.
    pub async fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        match MethodCall::parse(&request.method, &request.args) {
            Ok(call) => BridgeResponse::success(request.id, self.call(call).await),
            Err(e) => {
                debug!("Rejected bridge call {}: {}", request.method, e);
                BridgeResponse::failure(request.id, &e)
            }
        }
    }

    /// Execute a call and return its JSON result.
    pub async fn call(&self, call: MethodCall) -> Value {
        match call {
            MethodCall::StartCore { config_path } => {
                let result = self.supervisor.lock().await.start(&config_path).await;
                // The error observer has already been told why.
                json!(result.is_ok())
            }
            MethodCall::StopCore => {
                self.supervisor.lock().await.stop().await;
                json!(true)
            }
            MethodCall::ReloadConfig { config_path } => {
                let result = self
                    .supervisor
                    .lock()
                    .await
                    .reload_config(&config_path)
                    .await;
                if let Err(e) = &result {
                    warn!("Reload failed: {}", e);
                }
                json!(result.is_ok())
            }
            MethodCall::IsCoreRunning => json!(self.supervisor.lock().await.is_running()),
            MethodCall::GetCoreVersion => json!(self.client.version().await),
            MethodCall::GetVpnState => json!(self.state.load()),
            MethodCall::GetTrafficStats => {
                json!(TrafficStats::from_counters(self.client.traffic().await))
            }
            MethodCall::TestProxyDelay {
                proxy,
                url,
                timeout,
            } => json!(self.client.delay(&proxy, &url, timeout).await),
            MethodCall::SwitchProxy { selector, proxy } => {
                json!(self.client.switch_proxy(&selector, &proxy).await)
            }
            MethodCall::GetConnections => json!(self.client.connections().await),
            MethodCall::GetLogs => {
                let logs = self.supervisor.lock().await.logs().await;
                json!(logs.unwrap_or_else(|| NO_LOGS.to_string()))
            }
            MethodCall::ExportLogs => {
                let path = self.supervisor.lock().await.export_logs().await;
                json!(path.map(|p| p.to_string_lossy().into_owned()))
            }
        }
    }

    /// Stop the engine if it is running.
    pub async fn shutdown(&self) {
        self.supervisor.lock().await.stop().await;
    }
}
