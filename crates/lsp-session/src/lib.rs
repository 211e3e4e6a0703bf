//! Transport and session layer for a Language Server Protocol endpoint.
//!
//! The crate frames messages on a byte stream, decodes them into typed
//! requests and notifications, enforces the initialisation handshake, and
//! drives a synchronous dispatch loop that hands each message to an
//! application-supplied [`Handler`]. Payload schemas come from `lsp-types`;
//! the semantic answers come from the handler. The loop itself owns only the
//! session phase ([`SessionState`]) and threads the handler's opaque
//! application state through every call, replacing it on success and keeping
//! the previous value on failure.
//!
//! ```ignore
//! use lsp_session::Connection;
//!
//! let mut connection = Connection::new(std::io::stdin().lock(), std::io::stdout().lock());
//! let final_state = connection.run(&MyHandler, MyState::default())?;
//! ```

mod codec;
mod connection;
mod error;
mod handler;
mod jsonrpc;
mod messages;
mod readiness;
mod session;
mod transport;

pub use codec::{Message, decode};
pub use connection::{
    Connection, DEFAULT_MAX_CONTENT_LENGTH, SessionOptions, ShutdownHandle, run,
};
pub use error::{CodecError, FrameError, SessionError, WriteError};
pub use handler::{Handler, HandlerError, Outbox};
pub use jsonrpc::{
    ErrorCode, JsonRpcError, JsonRpcNotification, JsonRpcResponse, RequestId, ResponseOutcome,
};
pub use messages::{
    ClientNotification, ClientRequest, RegistryError, ServerNotification, ServiceRequest,
    ServiceResult,
};
#[cfg(unix)]
pub use readiness::PollReadiness;
pub use readiness::{AlwaysReady, Readiness};
pub use session::{Gate, SessionState};
pub use transport::{FrameReader, OutboundWriter};

#[cfg(test)]
mod tests;
