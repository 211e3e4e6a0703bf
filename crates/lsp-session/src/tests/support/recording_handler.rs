//! Recording handler used in session tests.

use std::cell::RefCell;

use lsp_types::{
    ClientCapabilities, InitializeParams, InitializeResult, MessageType, ServerCapabilities,
};

use crate::handler::{Handler, HandlerError, Outbox};
use crate::messages::{ClientNotification, ServiceRequest, ServiceResult};

/// Discriminates the kind of callback recorded by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// `on_initialize` was invoked.
    Initialize,
    /// `on_request` was invoked for the method.
    Request(&'static str),
    /// `on_notification` was invoked for the method.
    Notification(&'static str),
}

/// Application state threaded through the loop; counts successful callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestState {
    /// Number of callbacks that returned a new state.
    pub revision: u32,
}

impl TestState {
    fn next(self) -> Self {
        Self {
            revision: self.revision + 1,
        }
    }
}

/// Test double that records every callback routed through it.
///
/// Each failure switch makes the matching callback queue a log message and
/// then fail, so tests can check that queued output is discarded.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    calls: RefCell<Vec<CallKind>>,
    capabilities: RefCell<Vec<ClientCapabilities>>,
    fail_initialize: bool,
    fail_requests: bool,
    fail_notifications: bool,
}

impl RecordingHandler {
    /// Handler whose `on_initialize` fails.
    pub fn failing_initialize() -> Self {
        Self {
            fail_initialize: true,
            ..Self::default()
        }
    }

    /// Handler whose `on_request` fails.
    pub fn failing_requests() -> Self {
        Self {
            fail_requests: true,
            ..Self::default()
        }
    }

    /// Handler whose `on_notification` fails.
    pub fn failing_notifications() -> Self {
        Self {
            fail_notifications: true,
            ..Self::default()
        }
    }

    /// Callbacks recorded so far.
    pub fn calls(&self) -> Vec<CallKind> {
        self.calls.borrow().clone()
    }

    /// Capabilities passed to each `on_request` call.
    pub fn capabilities_seen(&self) -> Vec<ClientCapabilities> {
        self.capabilities.borrow().clone()
    }

    fn record(&self, call: CallKind) {
        self.calls.borrow_mut().push(call);
    }
}

impl Handler<TestState> for RecordingHandler {
    fn on_initialize(
        &self,
        state: &TestState,
        _params: InitializeParams,
        outbox: &mut Outbox,
    ) -> Result<(TestState, InitializeResult), HandlerError> {
        self.record(CallKind::Initialize);
        if self.fail_initialize {
            outbox.log_message(MessageType::ERROR, "initialize rejected");
            return Err(HandlerError::new("initialize rejected"));
        }
        let result = InitializeResult {
            capabilities: ServerCapabilities::default(),
            server_info: None,
        };
        Ok((state.next(), result))
    }

    fn on_request(
        &self,
        state: &TestState,
        capabilities: &ClientCapabilities,
        request: ServiceRequest,
        outbox: &mut Outbox,
    ) -> Result<(TestState, ServiceResult), HandlerError> {
        self.record(CallKind::Request(request.method()));
        self.capabilities.borrow_mut().push(capabilities.clone());
        if self.fail_requests {
            outbox.log_message(MessageType::ERROR, "request rejected");
            return Err(HandlerError::new("request rejected"));
        }
        let result = match request {
            ServiceRequest::Shutdown => ServiceResult::Shutdown,
            ServiceRequest::Hover(_) => ServiceResult::Hover(None),
            // Answers with the wrong kind to exercise result checking.
            ServiceRequest::Completion(_) => ServiceResult::Hover(None),
            ServiceRequest::References(_) => {
                outbox.log_message(MessageType::INFO, "references computed");
                ServiceResult::References(Some(Vec::new()))
            }
            ServiceRequest::GotoDefinition(_)
            | ServiceRequest::DocumentSymbol(_)
            | ServiceRequest::Formatting(_)
            | ServiceRequest::Rename(_)
            | ServiceRequest::SignatureHelp(_)
            | ServiceRequest::CodeAction(_)
            | ServiceRequest::ExecuteCommand(_) => ServiceResult::Unanswered,
        };
        Ok((state.next(), result))
    }

    fn on_notification(
        &self,
        state: &TestState,
        notification: ClientNotification,
        outbox: &mut Outbox,
    ) -> Result<TestState, HandlerError> {
        self.record(CallKind::Notification(notification.method()));
        if let ClientNotification::DidOpen(params) = &notification {
            outbox.log_message(
                MessageType::INFO,
                format!("opened {}", params.text_document.uri.as_str()),
            );
        }
        if self.fail_notifications {
            return Err(HandlerError::new("notification rejected"));
        }
        Ok(state.next())
    }
}
