//! Message bridge toward the UI layer.
//!
//! UI shells call into vortex-core by method name and receive engine events
//! as a stream. The transport here is newline-delimited JSON over any async
//! byte stream (stdin/stdout for the `bridge` subcommand).

mod dispatcher;
mod error;
mod protocol;
mod server;

pub use dispatcher::Bridge;
pub use error::BridgeError;
pub use protocol::{
    BridgeEvent, BridgeRequest, BridgeResponse, ErrorBody, MethodCall, DEFAULT_DELAY_TIMEOUT_MS,
    DEFAULT_DELAY_URL, PLATFORM_METHODS,
};
pub use server::serve;
