//! Session phase tracking and the handshake gate.
//!
//! [`SessionState::gate`] decides, without side effects, what the dispatch
//! loop must do with a decoded message in the current phase. Transitions are
//! likewise pure: [`SessionState::initialize`] and [`SessionState::close`]
//! return the next phase.

use std::sync::Arc;

use lsp_types::request::{Initialize, Request};
use lsp_types::{ClientCapabilities, InitializeParams};

use crate::codec::Message;
use crate::error::CodecError;
use crate::jsonrpc::{ErrorCode, JsonRpcError, JsonRpcResponse, RequestId};
use crate::messages::{ClientNotification, ClientRequest, RegistryError, ServiceRequest};

/// Phase of the session with the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    /// Waiting for `initialize`.
    #[default]
    Ready,
    /// Handshake complete; holds the capabilities the client advertised.
    Initialized(Arc<ClientCapabilities>),
    /// No further messages will be read.
    Closed,
}

/// Action the dispatch loop takes for one decoded message.
#[derive(Debug)]
pub enum Gate {
    /// Run the handshake through the handler.
    Handshake {
        /// Request identifier.
        id: RequestId,
        /// Handshake params.
        params: Box<InitializeParams>,
    },
    /// Answer with `ServerNotInitialized`.
    RejectNotInitialized {
        /// Request identifier.
        id: RequestId,
        /// Method of the rejected request.
        method: &'static str,
    },
    /// A second `initialize` arrived after the handshake.
    RejectDuplicateInitialize {
        /// Request identifier.
        id: RequestId,
    },
    /// Hand the request to the handler.
    Dispatch {
        /// Capabilities negotiated during the handshake.
        capabilities: Arc<ClientCapabilities>,
        /// Request identifier.
        id: RequestId,
        /// The request.
        request: ServiceRequest,
    },
    /// Hand the notification to the handler.
    Notify(ClientNotification),
    /// Hand `exit` to the handler, then close.
    NotifyAndClose(ClientNotification),
    /// Close without consulting the handler.
    Close,
    /// Discard a notification received before the handshake.
    Drop {
        /// Method of the discarded notification.
        method: &'static str,
    },
    /// The session is closed; nothing is processed.
    Halt,
}

impl SessionState {
    /// Whether the session has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Capabilities negotiated during the handshake, once initialised.
    #[must_use]
    pub fn capabilities(&self) -> Option<&ClientCapabilities> {
        match self {
            Self::Initialized(capabilities) => Some(capabilities),
            Self::Ready | Self::Closed => None,
        }
    }

    /// Short phase name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Initialized(_) => "initialized",
            Self::Closed => "closed",
        }
    }

    /// Phase after a successful handshake.
    ///
    /// Only `Ready` moves forward; any other phase is returned unchanged.
    #[must_use]
    pub fn initialize(self, capabilities: ClientCapabilities) -> Self {
        match self {
            Self::Ready => Self::Initialized(Arc::new(capabilities)),
            other => other,
        }
    }

    /// Phase after `exit` or an external shutdown.
    #[must_use]
    pub fn close(self) -> Self {
        Self::Closed
    }

    /// Decides how `message` is handled in this phase.
    #[must_use]
    pub fn gate(&self, message: Message) -> Gate {
        match (self, message) {
            (Self::Closed, _) => Gate::Halt,
            (Self::Ready, Message::Request { id, request }) => match request {
                ClientRequest::Initialize(params) => Gate::Handshake { id, params },
                ClientRequest::Service(request) => Gate::RejectNotInitialized {
                    id,
                    method: request.method(),
                },
            },
            (Self::Ready, Message::Notification(notification)) => {
                if notification.is_exit() {
                    Gate::Close
                } else {
                    Gate::Drop {
                        method: notification.method(),
                    }
                }
            }
            (Self::Initialized(capabilities), Message::Request { id, request }) => match request
            {
                ClientRequest::Initialize(_) => Gate::RejectDuplicateInitialize { id },
                ClientRequest::Service(request) => Gate::Dispatch {
                    capabilities: Arc::clone(capabilities),
                    id,
                    request,
                },
            },
            (Self::Initialized(_), Message::Notification(notification)) => {
                if notification.is_exit() {
                    Gate::NotifyAndClose(notification)
                } else {
                    Gate::Notify(notification)
                }
            }
        }
    }

    /// Error reply owed for a message that failed to decode, if any.
    ///
    /// Failures without a request id are never answered. Before the
    /// handshake every answerable failure reports `ServerNotInitialized`,
    /// except malformed `initialize` params which report `InvalidParams`.
    #[must_use]
    pub fn failure_reply(&self, error: &CodecError) -> Option<JsonRpcResponse> {
        let id = error.request_id()?.clone();
        let code = match (self, error) {
            (Self::Closed, _) => return None,
            (
                Self::Ready,
                CodecError::Registry {
                    source: RegistryError::InvalidParams { method, .. },
                    ..
                },
            ) if *method == Initialize::METHOD => ErrorCode::InvalidParams,
            (Self::Ready, _) => ErrorCode::ServerNotInitialized,
            (Self::Initialized(_), _) => error.error_code(),
        };
        Some(JsonRpcResponse::failure(
            Some(id),
            JsonRpcError::new(code, error.to_string()),
        ))
    }
}
