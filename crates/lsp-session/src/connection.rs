//! The dispatch loop tying framing, decoding, gating and the handler together.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lsp_types::{ClientCapabilities, InitializeParams};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::codec::{Message, decode};
use crate::error::{FrameError, SessionError, WriteError};
use crate::handler::{Handler, HandlerError, Outbox};
use crate::jsonrpc::{ErrorCode, JsonRpcError, JsonRpcResponse, RequestId};
use crate::messages::{ClientNotification, ServiceRequest, ServiceResult};
use crate::readiness::{AlwaysReady, Readiness};
use crate::session::{Gate, SessionState};
use crate::transport::{FrameReader, OutboundWriter};

const DISPATCH_TARGET: &str = "lsp_session::dispatch";

/// Default ceiling on a frame body, in bytes.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 32 * 1024 * 1024;

/// Tunables for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Largest frame body accepted; larger frames are drained and skipped.
    pub max_content_length: usize,
    /// Answer rejected handshakes and failed requests with an error reply
    /// instead of leaving them unanswered.
    pub reply_to_rejected: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            reply_to_rejected: false,
        }
    }
}

/// Requests that a running loop stop before its next read.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Forces the session to close before the next frame is read.
    pub fn close(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Whether [`ShutdownHandle::close`] has been called.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// One client connection over a pair of byte streams.
#[derive(Debug)]
pub struct Connection<R, W, Rd = AlwaysReady> {
    reader: FrameReader<R, Rd>,
    writer: OutboundWriter<W>,
    options: SessionOptions,
    shutdown: ShutdownHandle,
}

impl<R: Read, W: Write> Connection<R, W> {
    /// Creates a connection whose input never blocks on readiness.
    #[must_use]
    pub fn new(input: R, output: W) -> Self {
        Self::with_readiness(input, output, AlwaysReady)
    }
}

impl<R: Read, W: Write, Rd: Readiness> Connection<R, W, Rd> {
    /// Creates a connection that waits on `readiness` before each frame.
    #[must_use]
    pub fn with_readiness(input: R, output: W, readiness: Rd) -> Self {
        Self {
            reader: FrameReader::with_readiness(input, readiness),
            writer: OutboundWriter::new(output),
            options: SessionOptions::default(),
            shutdown: ShutdownHandle::default(),
        }
    }

    /// Applies connection options.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.reader = self.reader.with_max_content_length(options.max_content_length);
        self.options = options;
        self
    }

    /// Handle that closes this connection from another thread.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Borrows the output stream.
    #[must_use]
    pub fn output(&self) -> &W {
        self.writer.get_ref()
    }

    /// Unwraps the output stream.
    #[must_use]
    pub fn into_output(self) -> W {
        self.writer.into_inner()
    }

    /// Runs the loop from `Ready` until the session closes.
    ///
    /// Returns the final application state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when reading from or writing to the client
    /// fails; protocol and handler failures never end the loop.
    pub fn run<S, H: Handler<S>>(&mut self, handler: &H, state: S) -> Result<S, SessionError> {
        let mut session = SessionState::Ready;
        let mut state = state;
        while !session.is_closed() {
            (session, state) = self.step(handler, session, state)?;
        }
        info!(target: DISPATCH_TARGET, "session closed");
        Ok(state)
    }

    /// Reads and handles exactly one frame.
    ///
    /// A closed session, or one whose shutdown handle has fired, returns
    /// `Closed` without reading.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when reading from or writing to the client
    /// fails.
    pub fn step<S, H: Handler<S>>(
        &mut self,
        handler: &H,
        session: SessionState,
        state: S,
    ) -> Result<(SessionState, S), SessionError> {
        if session.is_closed() {
            return Ok((session, state));
        }
        if self.shutdown.is_requested() {
            info!(target: DISPATCH_TARGET, "shutdown requested");
            return Ok((session.close(), state));
        }

        let Some(message) = self.receive(&session)? else {
            return Ok((session, state));
        };

        debug!(
            target: DISPATCH_TARGET,
            method = message.method(),
            session = session.name(),
            "dispatching message"
        );

        match session.gate(message) {
            Gate::Handshake { id, params } => self.handshake(handler, session, state, id, *params),
            Gate::RejectNotInitialized { id, method } => {
                debug!(target: DISPATCH_TARGET, id = %id, method, "request before initialize");
                let error = JsonRpcError::new(
                    ErrorCode::ServerNotInitialized,
                    format!("server not initialized; '{method}' received before initialize"),
                );
                self.write(&JsonRpcResponse::failure(Some(id), error))?;
                Ok((session, state))
            }
            Gate::RejectDuplicateInitialize { id } => {
                warn!(
                    target: DISPATCH_TARGET,
                    id = %id,
                    "protocol violation: initialize received after handshake"
                );
                self.reject(id, ErrorCode::InvalidRequest, "server already initialized")?;
                Ok((session, state))
            }
            Gate::Dispatch {
                capabilities,
                id,
                request,
            } => {
                let next = self.dispatch(handler, state, &capabilities, id, request)?;
                Ok((session, next))
            }
            Gate::Notify(notification) => {
                let next = self.notify(handler, state, notification)?;
                Ok((session, next))
            }
            Gate::NotifyAndClose(notification) => {
                let next = self.notify(handler, state, notification)?;
                Ok((session.close(), next))
            }
            Gate::Close => {
                debug!(target: DISPATCH_TARGET, "exit received before initialize");
                Ok((session.close(), state))
            }
            Gate::Drop { method } => {
                debug!(target: DISPATCH_TARGET, method, "dropping notification before initialize");
                Ok((session, state))
            }
            Gate::Halt => Ok((session, state)),
        }
    }

    /// Reads and decodes the next frame, answering decode failures.
    ///
    /// `None` means the frame was consumed without yielding a message.
    fn receive(&mut self, session: &SessionState) -> Result<Option<Message>, SessionError> {
        let body = match self.reader.read_frame() {
            Ok(body) => body,
            Err(FrameError::Io(source)) => return Err(SessionError::Read(source)),
            Err(error) => {
                warn!(target: DISPATCH_TARGET, error = %error, "skipping unreadable frame");
                return Ok(None);
            }
        };

        match decode(&body) {
            Ok(message) => Ok(Some(message)),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    session = session.name(),
                    error = %error,
                    "failed to decode message"
                );
                if let Some(reply) = session.failure_reply(&error) {
                    self.write(&reply)?;
                }
                Ok(None)
            }
        }
    }

    fn handshake<S, H: Handler<S>>(
        &mut self,
        handler: &H,
        session: SessionState,
        state: S,
        id: RequestId,
        params: InitializeParams,
    ) -> Result<(SessionState, S), SessionError> {
        let capabilities = params.capabilities.clone();
        let mut outbox = Outbox::default();
        let outcome = handler
            .on_initialize(&state, params, &mut outbox)
            .and_then(|(next, result)| {
                let payload = serde_json::to_value(result).map_err(|source| {
                    HandlerError::with_source("failed to encode initialize result", source)
                })?;
                Ok((next, payload))
            });

        match outcome {
            Ok((next, payload)) => {
                self.write(&JsonRpcResponse::success(id, payload))?;
                self.flush(outbox)?;
                info!(target: DISPATCH_TARGET, "session initialized");
                Ok((session.initialize(capabilities), next))
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, id = %id, error = %error, "initialize failed");
                self.reject(id, ErrorCode::RequestFailed, error.message())?;
                Ok((session, state))
            }
        }
    }

    fn dispatch<S, H: Handler<S>>(
        &mut self,
        handler: &H,
        state: S,
        capabilities: &ClientCapabilities,
        id: RequestId,
        request: ServiceRequest,
    ) -> Result<S, SessionError> {
        let method = request.method();
        let mut outbox = Outbox::default();
        let outcome = handler
            .on_request(&state, capabilities, request, &mut outbox)
            .and_then(|(next, result)| Ok((next, encode_result(method, &result)?)));

        match outcome {
            Ok((next, Some(payload))) => {
                self.write(&JsonRpcResponse::success(id, payload))?;
                self.flush(outbox)?;
                Ok(next)
            }
            Ok((next, None)) => {
                debug!(target: DISPATCH_TARGET, id = %id, method, "request left unanswered");
                self.flush(outbox)?;
                Ok(next)
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, id = %id, method, error = %error, "request failed");
                self.reject(id, ErrorCode::RequestFailed, error.message())?;
                Ok(state)
            }
        }
    }

    fn notify<S, H: Handler<S>>(
        &mut self,
        handler: &H,
        state: S,
        notification: ClientNotification,
    ) -> Result<S, SessionError> {
        let method = notification.method();
        let mut outbox = Outbox::default();
        match handler.on_notification(&state, notification, &mut outbox) {
            Ok(next) => {
                self.flush(outbox)?;
                Ok(next)
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, method, error = %error, "notification failed");
                Ok(state)
            }
        }
    }

    /// Sends an error reply for a rejected request when configured to.
    fn reject(
        &mut self,
        id: RequestId,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), SessionError> {
        if !self.options.reply_to_rejected {
            return Ok(());
        }
        let error = JsonRpcError::new(code, message);
        self.write(&JsonRpcResponse::failure(Some(id), error))
    }

    fn flush(&mut self, outbox: Outbox) -> Result<(), SessionError> {
        for notification in outbox.into_pending() {
            match notification.encode() {
                Ok(message) => self.write(&message)?,
                Err(source) => error!(
                    target: DISPATCH_TARGET,
                    method = notification.method(),
                    error = %source,
                    "failed to encode notification"
                ),
            }
        }
        Ok(())
    }

    fn write<T: Serialize>(&mut self, message: &T) -> Result<(), SessionError> {
        match self.writer.write_message(message) {
            Ok(()) => Ok(()),
            Err(WriteError::Io(source)) => Err(SessionError::Write(source)),
            Err(WriteError::Encode(source)) => {
                error!(
                    target: DISPATCH_TARGET,
                    error = %source,
                    "failed to encode outbound message"
                );
                Ok(())
            }
        }
    }
}

/// Checks a handler result against its request and encodes the payload.
fn encode_result(method: &str, result: &ServiceResult) -> Result<Option<Value>, HandlerError> {
    if !result.answers(method) {
        return Err(HandlerError::new(format!(
            "handler answered '{method}' with a result for '{}'",
            result.method().unwrap_or_default()
        )));
    }
    result.encode().map_err(|source| {
        HandlerError::with_source(format!("failed to encode result for '{method}'"), source)
    })
}

/// Runs a session over `input` and `output` with default options.
///
/// Returns the final application state once the session closes.
///
/// # Errors
///
/// Returns [`SessionError`] when reading from or writing to the client fails.
pub fn run<S, H, R, W>(state: S, handler: &H, input: R, output: W) -> Result<S, SessionError>
where
    H: Handler<S>,
    R: Read,
    W: Write,
{
    Connection::new(input, output).run(handler, state)
}
