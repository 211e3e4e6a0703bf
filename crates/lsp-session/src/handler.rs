//! Application callbacks invoked by the dispatch loop.

use std::error::Error;

use lsp_types::{
    ClientCapabilities, Diagnostic, InitializeParams, InitializeResult, LogMessageParams,
    MessageType, PublishDiagnosticsParams, Uri,
};
use thiserror::Error;

use crate::messages::{ClientNotification, ServerNotification, ServiceRequest, ServiceResult};

/// Errors reported by handler implementations.
///
/// A failed callback leaves the application state as it was and discards
/// anything queued in the [`Outbox`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl HandlerError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Server notifications queued by a handler while processing one message.
///
/// The loop writes the queue, one frame per notification, only after the
/// callback succeeds.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<ServerNotification>,
}

impl Outbox {
    /// Queues a notification.
    pub fn push(&mut self, notification: ServerNotification) {
        self.pending.push(notification);
    }

    /// Queues a `window/logMessage` notification.
    pub fn log_message(&mut self, typ: MessageType, message: impl Into<String>) {
        self.push(ServerNotification::LogMessage(LogMessageParams {
            typ,
            message: message.into(),
        }));
    }

    /// Queues a `textDocument/publishDiagnostics` notification.
    pub fn publish_diagnostics(
        &mut self,
        uri: Uri,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        self.push(ServerNotification::PublishDiagnostics(
            PublishDiagnosticsParams {
                uri,
                diagnostics,
                version,
            },
        ));
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing has been queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn into_pending(self) -> Vec<ServerNotification> {
        self.pending
    }
}

/// Behaviour supplied by the application behind a connection.
///
/// `S` is the application state. The loop owns it and passes it by reference;
/// each successful callback returns the replacement value, and a failed one
/// leaves the current value in place.
pub trait Handler<S> {
    /// Answers the `initialize` handshake.
    ///
    /// # Errors
    ///
    /// A failure leaves the session uninitialised and sends no reply.
    fn on_initialize(
        &self,
        state: &S,
        params: InitializeParams,
        outbox: &mut Outbox,
    ) -> Result<(S, InitializeResult), HandlerError>;

    /// Answers a request received after the handshake.
    ///
    /// The returned [`ServiceResult`] must match the request's method or be
    /// [`ServiceResult::Unanswered`].
    ///
    /// # Errors
    ///
    /// A failure keeps the previous state and is logged.
    fn on_request(
        &self,
        state: &S,
        capabilities: &ClientCapabilities,
        request: ServiceRequest,
        outbox: &mut Outbox,
    ) -> Result<(S, ServiceResult), HandlerError>;

    /// Reacts to a notification received after the handshake, including
    /// `exit`.
    ///
    /// # Errors
    ///
    /// A failure keeps the previous state and is logged.
    fn on_notification(
        &self,
        state: &S,
        notification: ClientNotification,
        outbox: &mut Outbox,
    ) -> Result<S, HandlerError>;
}
