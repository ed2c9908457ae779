//! Telemetry for the supervised engine.
//!
//! - **Hub**: single-slot observers for state, traffic, log and error events
//! - **Rate**: bandwidth estimation from cumulative counters
//! - **Poller**: background task sampling `/traffic` while connected
//!
//! Diagnostic logging of vortex-core itself goes through `tracing` to stderr
//! and is a separate concern from the observer events here.

mod events;
mod hub;
mod poller;
mod rate;

pub use events::EngineEvent;
pub use hub::{MessageObserver, NotificationHub, StateObserver, TrafficObserver};
pub use poller::{PollerHandle, TrafficPoller};
pub use rate::{RateMeter, TrafficStats};
