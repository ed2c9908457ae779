//! Background traffic polling.
//!
//! While the engine is connected a single task samples `/traffic` once per
//! interval and publishes rates through the hub. Shutdown is a `watch`
//! signal checked at both await points of each cycle, and [`PollerHandle::stop`]
//! joins the task, so once `stop` returns no further traffic event can fire.
//!
//! # Example
//!
//! ```ignore
//! let handle = TrafficPoller::new(client, hub, Duration::from_secs(1)).spawn();
//! // ... engine runs ...
//! handle.stop().await;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::hub::NotificationHub;
use super::rate::RateMeter;
use crate::controller::ControlClient;

/// Samples cumulative counters and emits rate events.
pub struct TrafficPoller {
    client: Arc<ControlClient>,
    hub: Arc<NotificationHub>,
    interval: Duration,
    meter: RateMeter,
}

impl TrafficPoller {
    /// Create a poller. Nothing runs until [`TrafficPoller::spawn`].
    pub fn new(client: Arc<ControlClient>, hub: Arc<NotificationHub>, interval: Duration) -> Self {
        Self {
            client,
            hub,
            interval,
            meter: RateMeter::new(),
        }
    }

    /// Start polling on a new task.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        PollerHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    /// Poll until the shutdown signal is received.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Traffic poller started ({:?} interval)", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = self.poll_once() => {}
            }
        }

        debug!("Traffic poller stopped");
    }

    /// Take one sample and emit a traffic event if a rate is available.
    pub async fn poll_once(&mut self) {
        let counters = self.client.traffic().await;
        trace!("Traffic counters up={} down={}", counters.up, counters.down);

        if let Some(stats) = self.meter.sample(counters, Instant::now()) {
            self.hub.emit_traffic(stats);
        }
    }
}

/// Handle to a running poller task.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Signal shutdown and wait for the task to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            debug!("Traffic poller task ended abnormally: {}", e);
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
