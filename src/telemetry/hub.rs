//! Observer registrations and dispatch.
//!
//! The hub holds at most one observer per category. Registering replaces the
//! previous observer and registering `None` clears it. Events emitted while a
//! slot is empty are dropped; nothing is queued or replayed.
//!
//! Dispatch runs on the emitting task. The slot lock is released before the
//! observer is invoked, so an observer may re-register itself or others.

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::trace;

use super::events::EngineEvent;
use super::rate::TrafficStats;
use crate::engine::ConnectionState;

/// Observer for connection state transitions.
pub type StateObserver = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Observer for traffic samples.
pub type TrafficObserver = Arc<dyn Fn(TrafficStats) + Send + Sync>;

/// Observer for log lines or error messages.
pub type MessageObserver = Arc<dyn Fn(&str) + Send + Sync>;

type Slot<T> = RwLock<Option<T>>;

/// Single-slot observer registry.
#[derive(Default)]
pub struct NotificationHub {
    state: Slot<StateObserver>,
    traffic: Slot<TrafficObserver>,
    log: Slot<MessageObserver>,
    error: Slot<MessageObserver>,
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("state", &is_set(&self.state))
            .field("traffic", &is_set(&self.traffic))
            .field("log", &is_set(&self.log))
            .field("error", &is_set(&self.error))
            .finish()
    }
}

impl NotificationHub {
    /// Create a hub with every slot empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or clear the state observer.
    pub fn set_state_observer(&self, observer: Option<StateObserver>) {
        replace(&self.state, observer);
    }

    /// Register or clear the traffic observer.
    pub fn set_traffic_observer(&self, observer: Option<TrafficObserver>) {
        replace(&self.traffic, observer);
    }

    /// Register or clear the log observer.
    pub fn set_log_observer(&self, observer: Option<MessageObserver>) {
        replace(&self.log, observer);
    }

    /// Register or clear the error observer.
    pub fn set_error_observer(&self, observer: Option<MessageObserver>) {
        replace(&self.error, observer);
    }

    #[cfg(test)]
    fn has_traffic_observer(&self) -> bool {
        is_set(&self.traffic)
    }

    /// Deliver a state transition.
    pub fn emit_state(&self, state: ConnectionState) {
        match current(&self.state) {
            Some(observer) => observer(state),
            None => trace!("No state observer, dropping {}", state),
        }
    }

    /// Deliver a traffic sample.
    pub fn emit_traffic(&self, stats: TrafficStats) {
        if let Some(observer) = current(&self.traffic) {
            observer(stats);
        }
    }

    /// Deliver an engine log line.
    pub fn emit_log(&self, line: &str) {
        if let Some(observer) = current(&self.log) {
            observer(line);
        }
    }

    /// Deliver an error message.
    pub fn emit_error(&self, message: &str) {
        match current(&self.error) {
            Some(observer) => observer(message),
            None => trace!("No error observer, dropping: {}", message),
        }
    }

    /// Point every slot at a channel of [`EngineEvent`]s.
    ///
    /// Send failures (receiver gone) are ignored.
    pub fn forward_to(&self, tx: mpsc::UnboundedSender<EngineEvent>) {
        let state_tx = tx.clone();
        self.set_state_observer(Some(Arc::new(move |state| {
            let _ = state_tx.send(EngineEvent::StateChanged(state));
        })));

        let traffic_tx = tx.clone();
        self.set_traffic_observer(Some(Arc::new(move |stats| {
            let _ = traffic_tx.send(EngineEvent::Traffic(stats));
        })));

        let log_tx = tx.clone();
        self.set_log_observer(Some(Arc::new(move |line: &str| {
            let _ = log_tx.send(EngineEvent::Log(line.to_string()));
        })));

        self.set_error_observer(Some(Arc::new(move |message: &str| {
            let _ = tx.send(EngineEvent::Error(message.to_string()));
        })));
    }

    /// Clear every slot.
    pub fn clear(&self) {
        self.set_state_observer(None);
        self.set_traffic_observer(None);
        self.set_log_observer(None);
        self.set_error_observer(None);
    }
}

fn replace<T>(slot: &Slot<T>, value: Option<T>) {
    match slot.write() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

/// Clone the observer out so the lock is not held during the call.
fn current<T: Clone>(slot: &Slot<T>) -> Option<T> {
    match slot.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn is_set<T: Clone>(slot: &Slot<T>) -> bool {
    current(slot).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_hub() -> (NotificationHub, Arc<Mutex<Vec<ConnectionState>>>) {
        let hub = NotificationHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.set_state_observer(Some(Arc::new(move |s| sink.lock().unwrap().push(s))));
        (hub, seen)
    }

    #[test]
    fn test_emit_reaches_observer() {
        let (hub, seen) = recording_hub();
        hub.emit_state(ConnectionState::Connected);
        assert_eq!(*seen.lock().unwrap(), vec![ConnectionState::Connected]);
    }

    #[test]
    fn test_unregister_stops_delivery_without_replay() {
        let (hub, seen) = recording_hub();

        hub.set_state_observer(None);
        hub.emit_state(ConnectionState::Connected);
        assert!(seen.lock().unwrap().is_empty());

        let sink = seen.clone();
        hub.set_state_observer(Some(Arc::new(move |s| sink.lock().unwrap().push(s))));
        assert!(seen.lock().unwrap().is_empty());

        hub.emit_state(ConnectionState::Disconnecting);
        assert_eq!(*seen.lock().unwrap(), vec![ConnectionState::Disconnecting]);
    }

    #[test]
    fn test_register_replaces_previous() {
        let hub = NotificationHub::new();
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));

        let f = first.clone();
        hub.set_error_observer(Some(Arc::new(move |_: &str| *f.lock().unwrap() += 1)));
        let s = second.clone();
        hub.set_error_observer(Some(Arc::new(move |_: &str| *s.lock().unwrap() += 1)));

        hub.emit_error("boom");
        assert_eq!(*first.lock().unwrap(), 0);
        assert_eq!(*second.lock().unwrap(), 1);
    }

    #[test]
    fn test_observer_may_clear_itself() {
        let hub = Arc::new(NotificationHub::new());
        let calls = Arc::new(Mutex::new(0));

        let weak = Arc::downgrade(&hub);
        let c = calls.clone();
        hub.set_log_observer(Some(Arc::new(move |_: &str| {
            *c.lock().unwrap() += 1;
            if let Some(hub) = weak.upgrade() {
                hub.set_log_observer(None);
            }
        })));

        hub.emit_log("one");
        hub.emit_log("two");
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_forward_to_channel() {
        let hub = NotificationHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.forward_to(tx);

        hub.emit_state(ConnectionState::Connected);
        hub.emit_log("hello");
        hub.emit_error("bad");
        hub.emit_traffic(TrafficStats::default());

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::StateChanged(ConnectionState::Connected)
        );
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Log("hello".into()));
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Error("bad".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Traffic(TrafficStats::default())
        );
    }

    #[test]
    fn test_clear_drops_channel_senders() {
        let hub = NotificationHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.forward_to(tx);
        hub.clear();

        assert!(!hub.has_traffic_observer());
        // All senders lived in the slots, so the channel is now closed.
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
