//! Engine lifecycle supervision.
//!
//! The supervisor owns the engine process, the connection state and the
//! background tasks that run alongside the engine (traffic poller and log
//! forwarder). Lifecycle methods take `&mut self`; callers that share a
//! supervisor between tasks wrap it in a `tokio::sync::Mutex`.
//!
//! # State machine
//!
//! ```text
//!                start ok                       stop
//! disconnected ──────────► connected ──────► disconnecting ──────► disconnected
//!      ▲    │ spawn failure /
//!      └────┘ immediate exit
//! ```
//!
//! Every transition is broadcast to the state observer. The process handle is
//! present exactly when the state is not `disconnected`, and the poller runs
//! exactly while the state is `connected`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::SupervisorError;
use super::handle::EngineHandle;
use super::logs::{self, NO_LOGS};
use super::state::{ConnectionState, StateCell};
use crate::config::Settings;
use crate::controller::{ControlClient, ControllerEndpoint};
use crate::telemetry::{NotificationHub, PollerHandle, TrafficPoller, TrafficStats};

/// Where the engine lives and which config it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDescriptor {
    /// Working directory passed to the engine with `-d`.
    pub work_dir: PathBuf,
    /// Engine executable.
    pub core_path: PathBuf,
    /// Active configuration file, set once the engine has been started.
    pub config_path: Option<PathBuf>,
}

/// Owns the engine process and everything that runs alongside it.
pub struct Supervisor {
    settings: Settings,
    descriptor: Option<EngineDescriptor>,
    client: Arc<ControlClient>,
    hub: Arc<NotificationHub>,
    state: Arc<StateCell>,
    engine: Option<EngineHandle>,
    poller: Option<PollerHandle>,
    log_forwarder: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Create an idle supervisor. Call [`Supervisor::init`] before starting.
    pub fn new(settings: Settings) -> Self {
        let endpoint =
            ControllerEndpoint::new(settings.controller.host.clone(), settings.controller.port);
        let client = ControlClient::new(endpoint, settings.controller.request_timeout());

        Self {
            settings,
            descriptor: None,
            client: Arc::new(client),
            hub: Arc::new(NotificationHub::new()),
            state: Arc::new(StateCell::new()),
            engine: None,
            poller: None,
            log_forwarder: None,
        }
    }

    /// Observer registrations.
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// Control API client.
    pub fn client(&self) -> &Arc<ControlClient> {
        &self.client
    }

    /// Shared state cell, readable without holding the supervisor.
    pub fn state_cell(&self) -> Arc<StateCell> {
        self.state.clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Engine location, once initialized.
    pub fn descriptor(&self) -> Option<&EngineDescriptor> {
        self.descriptor.as_ref()
    }

    /// Active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Prepare the working directory and locate the engine executable.
    ///
    /// Errors are also delivered to the error observer.
    pub fn init(&mut self, work_dir: impl AsRef<Path>) -> Result<(), SupervisorError> {
        if self.engine.is_some() {
            return Err(SupervisorError::AlreadyRunning);
        }

        let work_dir = work_dir.as_ref().to_path_buf();
        if let Err(source) = fs::create_dir_all(&work_dir) {
            return Err(self.report(SupervisorError::WorkDir {
                path: work_dir,
                source,
            }));
        }

        let core_path = work_dir.join(self.settings.engine.executable_name());
        if !core_path.is_file() {
            return Err(self.report(SupervisorError::EngineNotFound { path: core_path }));
        }

        info!("Engine located at {:?}", core_path);
        self.descriptor = Some(EngineDescriptor {
            work_dir,
            core_path,
            config_path: None,
        });
        Ok(())
    }

    /// Launch the engine with `config` and confirm it survives startup.
    ///
    /// Succeeds without doing anything if the engine is already running.
    pub async fn start(&mut self, config: impl AsRef<Path>) -> Result<(), SupervisorError> {
        if self.is_running() {
            debug!("Start requested but engine already running");
            return Ok(());
        }
        if self.engine.is_some() {
            warn!("Engine exited on its own, cleaning up before restart");
            self.stop().await;
        }

        let Some(descriptor) = self.descriptor.clone() else {
            return Err(self.report(SupervisorError::NotInitialized));
        };
        let config = config.as_ref().to_path_buf();

        // Resolve the control endpoint before anything can query it.
        self.client.update_from_file(&config);

        let spawned = EngineHandle::spawn(&descriptor.core_path, &descriptor.work_dir, &config);
        let mut handle = match spawned {
            Ok(handle) => handle,
            Err(e) => return Err(self.report(e)),
        };

        tokio::time::sleep(self.settings.supervisor.startup_grace()).await;

        if let Ok(Some(status)) = handle.try_wait() {
            debug!("Engine exited during startup grace with {}", status);
            drop(handle);
            return Err(self.report(SupervisorError::ExitedImmediately));
        }

        let (stdout, stderr) = handle.take_output();
        self.engine = Some(handle);
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.config_path = Some(config);
        }
        self.set_state(ConnectionState::Connected);

        self.poller = Some(
            TrafficPoller::new(
                self.client.clone(),
                self.hub.clone(),
                self.settings.supervisor.poll_interval(),
            )
            .spawn(),
        );
        self.log_forwarder = Some(logs::spawn_log_forwarder(
            stdout,
            stderr,
            self.hub.clone(),
            descriptor.work_dir.join(&self.settings.engine.log_file),
        ));

        info!("Engine started ({})", self.client.endpoint().authority());
        Ok(())
    }

    /// Stop the poller, kill the engine and release everything.
    ///
    /// Does nothing if the engine is not running. Bounded by the stop timeout
    /// for the process and again for the log forwarder.
    pub async fn stop(&mut self) {
        let Some(handle) = self.engine.take() else {
            debug!("Stop requested but engine not running");
            return;
        };

        self.set_state(ConnectionState::Disconnecting);

        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }

        let timeout = self.settings.supervisor.stop_timeout();
        handle.terminate(timeout).await;

        if let Some(mut forwarder) = self.log_forwarder.take()
            && tokio::time::timeout(timeout, &mut forwarder).await.is_err()
        {
            warn!("Log forwarder did not finish, aborting");
            forwarder.abort();
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Engine stopped");
    }

    /// Ask the running engine to switch to another configuration file.
    pub async fn reload_config(&mut self, config: impl AsRef<Path>) -> Result<(), SupervisorError> {
        if !self.is_running() {
            return Err(SupervisorError::NotRunning);
        }

        let config = config.as_ref();
        if !self.client.reload_config(config).await {
            warn!("Engine rejected configuration {:?}", config);
            return Err(SupervisorError::ReloadRejected {
                path: config.to_path_buf(),
            });
        }

        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.config_path = Some(config.to_path_buf());
        }
        self.client.update_from_file(config);
        info!("Engine configuration reloaded from {:?}", config);
        Ok(())
    }

    /// Whether the engine is believed running and the OS agrees.
    pub fn is_running(&mut self) -> bool {
        self.engine.as_mut().is_some_and(EngineHandle::is_running)
    }

    /// Engine version, or `"unknown"`.
    pub async fn version(&self) -> String {
        self.client.version().await
    }

    /// Fresh counters with zero rates.
    pub async fn traffic_stats(&self) -> TrafficStats {
        TrafficStats::from_counters(self.client.traffic().await)
    }

    /// Proxy latency in milliseconds, or `-1`.
    pub async fn test_delay(&self, proxy: &str, test_url: &str, timeout_ms: u64) -> i64 {
        self.client.delay(proxy, test_url, timeout_ms).await
    }

    /// Select `proxy` in `selector`.
    pub async fn switch_proxy(&self, selector: &str, proxy: &str) -> bool {
        self.client.switch_proxy(selector, proxy).await
    }

    /// Raw connections snapshot.
    pub async fn connections(&self) -> String {
        self.client.connections().await
    }

    /// Contents of the engine log file.
    pub async fn logs(&self) -> Option<String> {
        let path = self.log_path()?;
        logs::read_logs(&path).await
    }

    /// Copy the engine log to a timestamped file in the working directory.
    pub async fn export_logs(&self) -> Option<PathBuf> {
        let work_dir = &self.descriptor.as_ref()?.work_dir;
        let contents = self.logs().await.unwrap_or_else(|| NO_LOGS.to_string());
        logs::export_logs(work_dir, &contents).await
    }

    fn log_path(&self) -> Option<PathBuf> {
        let descriptor = self.descriptor.as_ref()?;
        Some(descriptor.work_dir.join(&self.settings.engine.log_file))
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.store(state);
        debug!("Connection state {} -> {}", previous, state);
        self.hub.emit_state(state);
    }

    fn report(&self, err: SupervisorError) -> SupervisorError {
        error!("{}", err);
        self.hub.emit_error(&err.to_string());
        err
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.engine.is_some() {
            warn!("Supervisor dropped with engine running, killing it");
        }
        if let Some(forwarder) = self.log_forwarder.take() {
            forwarder.abort();
        }
    }
}
