//! Typed registry of the LSP methods this layer understands.
//!
//! Every supported method is a variant of a closed enum whose payload types
//! are taken from the matching `lsp-types` request or notification, so a
//! handler matches exhaustively and each arm sees its own parameter and result
//! types. Method names are looked up through the `lsp-types` `METHOD`
//! constants.

use lsp_types::notification::{self, Notification};
use lsp_types::request::{self, Request};
use lsp_types::{InitializeParams, InitializedParams};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::jsonrpc::JsonRpcNotification;

type Params<R> = <R as Request>::Params;
type Answer<R> = <R as Request>::Result;
type NotificationParams<N> = <N as Notification>::Params;

/// Failures raised by the registry while decoding a payload.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registry entry exists for the method name.
    #[error("unknown method '{method}'")]
    UnknownMethod {
        /// The unrecognised method name.
        method: String,
    },

    /// The params did not match the method's payload schema.
    #[error("invalid params for '{method}': {source}")]
    InvalidParams {
        /// Method whose params were rejected.
        method: &'static str,
        /// Schema mismatch reported by the decoder.
        #[source]
        source: serde_json::Error,
    },
}

impl RegistryError {
    /// Method name of the rejected message.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::UnknownMethod { method } => method,
            Self::InvalidParams { method, .. } => method,
        }
    }
}

fn decode_params<T: DeserializeOwned>(
    method: &'static str,
    params: Option<Value>,
) -> Result<T, RegistryError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|source| RegistryError::InvalidParams { method, source })
}

fn request_params<R: Request>(params: Option<Value>) -> Result<R::Params, RegistryError> {
    decode_params(R::METHOD, params)
}

fn notification_params<N: Notification>(
    params: Option<Value>,
) -> Result<N::Params, RegistryError> {
    decode_params(N::METHOD, params)
}

/// Decodes `initialize` params, treating omitted capabilities as empty.
fn initialize_params(params: Option<Value>) -> Result<InitializeParams, RegistryError> {
    let mut value = params.unwrap_or_else(|| Value::Object(Map::new()));
    if let Value::Object(fields) = &mut value {
        fields
            .entry("capabilities")
            .or_insert_with(|| Value::Object(Map::new()));
    }
    request_params::<request::Initialize>(Some(value))
}

/// A request sent by the client.
#[derive(Debug, Clone)]
pub enum ClientRequest {
    /// `initialize`, answered by [`crate::Handler::on_initialize`].
    Initialize(Box<InitializeParams>),
    /// Any request serviced after the handshake.
    Service(ServiceRequest),
}

impl ClientRequest {
    /// Decodes a request payload for the given method.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownMethod`] for unregistered methods and
    /// [`RegistryError::InvalidParams`] when the params do not match.
    pub fn decode(method: &str, params: Option<Value>) -> Result<Self, RegistryError> {
        if method == request::Initialize::METHOD {
            return initialize_params(params).map(|params| Self::Initialize(Box::new(params)));
        }
        ServiceRequest::decode(method, params).map(Self::Service)
    }

    /// Method name of the request.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Initialize(_) => request::Initialize::METHOD,
            Self::Service(request) => request.method(),
        }
    }
}

/// Requests handed to [`crate::Handler::on_request`] once the session is
/// initialised.
#[derive(Debug, Clone)]
pub enum ServiceRequest {
    /// `shutdown`.
    Shutdown,
    /// `textDocument/hover`.
    Hover(Params<request::HoverRequest>),
    /// `textDocument/completion`.
    Completion(Params<request::Completion>),
    /// `textDocument/definition`.
    GotoDefinition(Params<request::GotoDefinition>),
    /// `textDocument/references`.
    References(Params<request::References>),
    /// `textDocument/documentSymbol`.
    DocumentSymbol(Params<request::DocumentSymbolRequest>),
    /// `textDocument/formatting`.
    Formatting(Params<request::Formatting>),
    /// `textDocument/rename`.
    Rename(Params<request::Rename>),
    /// `textDocument/signatureHelp`.
    SignatureHelp(Params<request::SignatureHelpRequest>),
    /// `textDocument/codeAction`.
    CodeAction(Params<request::CodeActionRequest>),
    /// `workspace/executeCommand`.
    ExecuteCommand(Params<request::ExecuteCommand>),
}

impl ServiceRequest {
    /// Decodes a post-handshake request payload for the given method.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownMethod`] for unregistered methods and
    /// [`RegistryError::InvalidParams`] when the params do not match.
    pub fn decode(method: &str, params: Option<Value>) -> Result<Self, RegistryError> {
        let request = match method {
            request::Shutdown::METHOD => Self::Shutdown,
            request::HoverRequest::METHOD => {
                Self::Hover(request_params::<request::HoverRequest>(params)?)
            }
            request::Completion::METHOD => {
                Self::Completion(request_params::<request::Completion>(params)?)
            }
            request::GotoDefinition::METHOD => {
                Self::GotoDefinition(request_params::<request::GotoDefinition>(params)?)
            }
            request::References::METHOD => {
                Self::References(request_params::<request::References>(params)?)
            }
            request::DocumentSymbolRequest::METHOD => {
                Self::DocumentSymbol(request_params::<request::DocumentSymbolRequest>(params)?)
            }
            request::Formatting::METHOD => {
                Self::Formatting(request_params::<request::Formatting>(params)?)
            }
            request::Rename::METHOD => Self::Rename(request_params::<request::Rename>(params)?),
            request::SignatureHelpRequest::METHOD => {
                Self::SignatureHelp(request_params::<request::SignatureHelpRequest>(params)?)
            }
            request::CodeActionRequest::METHOD => {
                Self::CodeAction(request_params::<request::CodeActionRequest>(params)?)
            }
            request::ExecuteCommand::METHOD => {
                Self::ExecuteCommand(request_params::<request::ExecuteCommand>(params)?)
            }
            other => {
                return Err(RegistryError::UnknownMethod {
                    method: other.to_owned(),
                });
            }
        };
        Ok(request)
    }

    /// Method name of the request.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Shutdown => request::Shutdown::METHOD,
            Self::Hover(_) => request::HoverRequest::METHOD,
            Self::Completion(_) => request::Completion::METHOD,
            Self::GotoDefinition(_) => request::GotoDefinition::METHOD,
            Self::References(_) => request::References::METHOD,
            Self::DocumentSymbol(_) => request::DocumentSymbolRequest::METHOD,
            Self::Formatting(_) => request::Formatting::METHOD,
            Self::Rename(_) => request::Rename::METHOD,
            Self::SignatureHelp(_) => request::SignatureHelpRequest::METHOD,
            Self::CodeAction(_) => request::CodeActionRequest::METHOD,
            Self::ExecuteCommand(_) => request::ExecuteCommand::METHOD,
        }
    }
}

/// Result produced by the handler for a [`ServiceRequest`].
///
/// Each variant carries the `lsp-types` result type of the request with the
/// same name. [`ServiceResult::Unanswered`] encodes to nothing, so no response
/// frame is written for it.
#[derive(Debug, Clone)]
pub enum ServiceResult {
    /// Result of `shutdown`.
    Shutdown,
    /// Result of `textDocument/hover`.
    Hover(Answer<request::HoverRequest>),
    /// Result of `textDocument/completion`.
    Completion(Answer<request::Completion>),
    /// Result of `textDocument/definition`.
    GotoDefinition(Answer<request::GotoDefinition>),
    /// Result of `textDocument/references`.
    References(Answer<request::References>),
    /// Result of `textDocument/documentSymbol`.
    DocumentSymbol(Answer<request::DocumentSymbolRequest>),
    /// Result of `textDocument/formatting`.
    Formatting(Answer<request::Formatting>),
    /// Result of `textDocument/rename`.
    Rename(Answer<request::Rename>),
    /// Result of `textDocument/signatureHelp`.
    SignatureHelp(Answer<request::SignatureHelpRequest>),
    /// Result of `textDocument/codeAction`.
    CodeAction(Answer<request::CodeActionRequest>),
    /// Result of `workspace/executeCommand`.
    ExecuteCommand(Answer<request::ExecuteCommand>),
    /// The handler deliberately leaves the request without a response.
    Unanswered,
}

impl ServiceResult {
    /// Method this result answers; `None` for [`ServiceResult::Unanswered`].
    #[must_use]
    pub fn method(&self) -> Option<&'static str> {
        let method = match self {
            Self::Shutdown => request::Shutdown::METHOD,
            Self::Hover(_) => request::HoverRequest::METHOD,
            Self::Completion(_) => request::Completion::METHOD,
            Self::GotoDefinition(_) => request::GotoDefinition::METHOD,
            Self::References(_) => request::References::METHOD,
            Self::DocumentSymbol(_) => request::DocumentSymbolRequest::METHOD,
            Self::Formatting(_) => request::Formatting::METHOD,
            Self::Rename(_) => request::Rename::METHOD,
            Self::SignatureHelp(_) => request::SignatureHelpRequest::METHOD,
            Self::CodeAction(_) => request::CodeActionRequest::METHOD,
            Self::ExecuteCommand(_) => request::ExecuteCommand::METHOD,
            Self::Unanswered => return None,
        };
        Some(method)
    }

    /// Whether this result may be sent in reply to a request for `method`.
    #[must_use]
    pub fn answers(&self, method: &str) -> bool {
        self.method().is_none_or(|answered| answered == method)
    }

    /// Encodes the result payload; `None` means no response is sent.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error if the payload cannot be encoded.
    pub fn encode(&self) -> Result<Option<Value>, serde_json::Error> {
        fn encoded<T: Serialize>(value: &T) -> Result<Option<Value>, serde_json::Error> {
            serde_json::to_value(value).map(Some)
        }

        match self {
            Self::Shutdown => Ok(Some(Value::Null)),
            Self::Hover(result) => encoded(result),
            Self::Completion(result) => encoded(result),
            Self::GotoDefinition(result) => encoded(result),
            Self::References(result) => encoded(result),
            Self::DocumentSymbol(result) => encoded(result),
            Self::Formatting(result) => encoded(result),
            Self::Rename(result) => encoded(result),
            Self::SignatureHelp(result) => encoded(result),
            Self::CodeAction(result) => encoded(result),
            Self::ExecuteCommand(result) => encoded(result),
            Self::Unanswered => Ok(None),
        }
    }
}

/// A notification sent by the client.
#[derive(Debug, Clone)]
pub enum ClientNotification {
    /// `initialized`.
    Initialized(InitializedParams),
    /// `exit`.
    Exit,
    /// `textDocument/didOpen`.
    DidOpen(NotificationParams<notification::DidOpenTextDocument>),
    /// `textDocument/didChange`.
    DidChange(NotificationParams<notification::DidChangeTextDocument>),
    /// `textDocument/didClose`.
    DidClose(NotificationParams<notification::DidCloseTextDocument>),
    /// `textDocument/didSave`.
    DidSave(NotificationParams<notification::DidSaveTextDocument>),
    /// `workspace/didChangeConfiguration`.
    DidChangeConfiguration(NotificationParams<notification::DidChangeConfiguration>),
    /// `workspace/didChangeWatchedFiles`.
    DidChangeWatchedFiles(NotificationParams<notification::DidChangeWatchedFiles>),
    /// `$/cancelRequest`.
    Cancel(NotificationParams<notification::Cancel>),
    /// `$/setTrace`.
    SetTrace(NotificationParams<notification::SetTrace>),
}

impl ClientNotification {
    /// Decodes a notification payload for the given method.
    ///
    /// `initialized` and `exit` carry no meaningful params, so whatever the
    /// client sent is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownMethod`] for unregistered methods and
    /// [`RegistryError::InvalidParams`] when the params do not match.
    pub fn decode(method: &str, params: Option<Value>) -> Result<Self, RegistryError> {
        let notification = match method {
            notification::Initialized::METHOD => Self::Initialized(InitializedParams {}),
            notification::Exit::METHOD => Self::Exit,
            notification::DidOpenTextDocument::METHOD => Self::DidOpen(notification_params::<
                notification::DidOpenTextDocument,
            >(params)?),
            notification::DidChangeTextDocument::METHOD => Self::DidChange(notification_params::<
                notification::DidChangeTextDocument,
            >(params)?),
            notification::DidCloseTextDocument::METHOD => Self::DidClose(notification_params::<
                notification::DidCloseTextDocument,
            >(params)?),
            notification::DidSaveTextDocument::METHOD => Self::DidSave(notification_params::<
                notification::DidSaveTextDocument,
            >(params)?),
            notification::DidChangeConfiguration::METHOD => {
                Self::DidChangeConfiguration(notification_params::<
                    notification::DidChangeConfiguration,
                >(params)?)
            }
            notification::DidChangeWatchedFiles::METHOD => {
                Self::DidChangeWatchedFiles(notification_params::<
                    notification::DidChangeWatchedFiles,
                >(params)?)
            }
            notification::Cancel::METHOD => {
                Self::Cancel(notification_params::<notification::Cancel>(params)?)
            }
            notification::SetTrace::METHOD => {
                Self::SetTrace(notification_params::<notification::SetTrace>(params)?)
            }
            other => {
                return Err(RegistryError::UnknownMethod {
                    method: other.to_owned(),
                });
            }
        };
        Ok(notification)
    }

    /// Method name of the notification.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Initialized(_) => notification::Initialized::METHOD,
            Self::Exit => notification::Exit::METHOD,
            Self::DidOpen(_) => notification::DidOpenTextDocument::METHOD,
            Self::DidChange(_) => notification::DidChangeTextDocument::METHOD,
            Self::DidClose(_) => notification::DidCloseTextDocument::METHOD,
            Self::DidSave(_) => notification::DidSaveTextDocument::METHOD,
            Self::DidChangeConfiguration(_) => notification::DidChangeConfiguration::METHOD,
            Self::DidChangeWatchedFiles(_) => notification::DidChangeWatchedFiles::METHOD,
            Self::Cancel(_) => notification::Cancel::METHOD,
            Self::SetTrace(_) => notification::SetTrace::METHOD,
        }
    }

    /// Whether this is the `exit` notification.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }
}

/// A notification originated by the server.
#[derive(Debug, Clone)]
pub enum ServerNotification {
    /// `window/logMessage`.
    LogMessage(NotificationParams<notification::LogMessage>),
    /// `window/showMessage`.
    ShowMessage(NotificationParams<notification::ShowMessage>),
    /// `textDocument/publishDiagnostics`.
    PublishDiagnostics(NotificationParams<notification::PublishDiagnostics>),
}

impl ServerNotification {
    /// Method name of the notification.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::LogMessage(_) => notification::LogMessage::METHOD,
            Self::ShowMessage(_) => notification::ShowMessage::METHOD,
            Self::PublishDiagnostics(_) => notification::PublishDiagnostics::METHOD,
        }
    }

    /// Encodes the notification into its wire envelope.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error if the params cannot be encoded.
    pub fn encode(&self) -> Result<JsonRpcNotification, serde_json::Error> {
        let params = match self {
            Self::LogMessage(params) => serde_json::to_value(params)?,
            Self::ShowMessage(params) => serde_json::to_value(params)?,
            Self::PublishDiagnostics(params) => serde_json::to_value(params)?,
        };
        Ok(JsonRpcNotification::new(self.method(), params))
    }
}
