//! Engine process supervision.
//!
//! This module launches the proxy engine, confirms it survived startup,
//! tracks the connection state and tears the process down again. While the
//! engine runs, its output is forwarded to the log observer and its traffic
//! counters are polled (see [`crate::telemetry`]).

pub mod error;
pub mod handle;
pub mod logs;
pub mod state;
pub mod supervisor;

pub use error::SupervisorError;
pub use handle::{engine_command, EngineHandle};
pub use logs::NO_LOGS;
pub use state::{ConnectionState, StateCell};
pub use supervisor::{EngineDescriptor, Supervisor};
