//! Command handling for vortex-core.
//!
//! Each subcommand builds its own tokio runtime and blocks on it, keeping
//! `main` synchronous.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::bridge::{self, Bridge, BridgeEvent};
use crate::cli::{Commands, QueryKind};
use crate::config::Settings;
use crate::controller::{ControlClient, ControllerEndpoint};
use crate::engine::Supervisor;
use crate::telemetry::{EngineEvent, TrafficStats};

/// How often `run` checks that the engine is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Dispatch a parsed subcommand.
pub fn handle_command(command: Commands, settings: Settings) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match command {
        Commands::Run { work_dir, config } => {
            rt.block_on(run_foreground(settings, &work_dir, &config))
        }
        Commands::Bridge { work_dir } => rt.block_on(run_bridge(settings, &work_dir)),
        Commands::Query { config, kind } => {
            rt.block_on(run_query(settings, config.as_deref(), kind))
        }
    }
}

/// Start the engine and stream events to stdout until interrupted.
async fn run_foreground(settings: Settings, work_dir: &Path, config: &Path) -> Result<()> {
    let mut supervisor = Supervisor::new(settings);
    let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
    supervisor.hub().forward_to(tx);

    supervisor
        .init(work_dir)
        .context("Failed to initialize supervisor")?;

    let mut stdout = tokio::io::stdout();
    let started = supervisor.start(config).await;
    // Flush whatever start produced, including the error event on failure.
    while let Ok(event) = events.try_recv() {
        print_event(&mut stdout, &event).await?;
    }
    started.context("Failed to start engine")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping engine");
                break;
            }
            Some(event) = events.recv() => print_event(&mut stdout, &event).await?,
            _ = liveness.tick() => {
                if !supervisor.is_running() {
                    warn!("Engine exited unexpectedly");
                    break;
                }
            }
        }
    }

    supervisor.stop().await;
    supervisor.hub().clear();
    while let Ok(event) = events.try_recv() {
        print_event(&mut stdout, &event).await?;
    }
    Ok(())
}

async fn print_event(stdout: &mut tokio::io::Stdout, event: &EngineEvent) -> Result<()> {
    let mut line = serde_json::to_vec(&BridgeEvent::from(event))?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}

/// Serve the bridge over stdin/stdout.
async fn run_bridge(settings: Settings, work_dir: &Path) -> Result<()> {
    let mut supervisor = Supervisor::new(settings);
    // A missing engine binary is reported to the UI through startCore failing,
    // so the bridge still comes up.
    if let Err(e) = supervisor.init(work_dir) {
        warn!("Supervisor initialization failed: {}", e);
    }

    let bridge = Arc::new(Bridge::new(supervisor));
    bridge::serve(bridge, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Bridge transport failed")
}

/// Run a single control query and print the result.
async fn run_query(settings: Settings, config: Option<&Path>, kind: QueryKind) -> Result<()> {
    let mut endpoint =
        ControllerEndpoint::new(settings.controller.host.clone(), settings.controller.port);
    if let Some(config) = config
        && !endpoint.update_from_file(config)
    {
        anyhow::bail!("Failed to read engine config {}", config.display());
    }
    debug!("Querying controller at {}", endpoint.authority());

    let client = ControlClient::new(endpoint, settings.controller.request_timeout());
    let output = match kind {
        QueryKind::Version => client.version().await,
        QueryKind::Traffic => {
            serde_json::to_string(&TrafficStats::from_counters(client.traffic().await))?
        }
        QueryKind::Connections => client.connections().await,
        QueryKind::Delay { name, url, timeout } => {
            client.delay(&name, &url, timeout).await.to_string()
        }
    };

    println!("{}", output);
    Ok(())
}
