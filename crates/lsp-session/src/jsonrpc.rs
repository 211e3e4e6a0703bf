//! JSON-RPC 2.0 envelope, response and error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version written on every outbound message.
pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Identifier of a client request, echoed verbatim in the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer identifier.
    Integer(i64),
    /// String identifier.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(formatter, "{id}"),
            Self::String(id) => write!(formatter, "{id:?}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_owned())
    }
}

/// Inbound wire envelope before method-specific decoding.
///
/// A JSON `null` id deserialises to `None`, so it classifies as a
/// notification.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub(crate) id: Option<RequestId>,
    pub(crate) method: String,
    #[serde(default)]
    pub(crate) params: Option<Value>,
}

/// Error codes reserved by JSON-RPC and the Language Server Protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received.
    ParseError,
    /// The JSON sent is not a valid request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// A request arrived before the `initialize` handshake completed.
    ServerNotInitialized,
    /// Catch-all code for unclassified failures.
    UnknownErrorCode,
    /// The request was syntactically valid but the server failed to answer it.
    RequestFailed,
    /// The server cancelled the request.
    ServerCancelled,
    /// The document changed while the request was being handled.
    ContentModified,
    /// The client cancelled the request.
    RequestCancelled,
}

impl ErrorCode {
    const ALL: [Self; 11] = [
        Self::ParseError,
        Self::InvalidRequest,
        Self::MethodNotFound,
        Self::InvalidParams,
        Self::InternalError,
        Self::ServerNotInitialized,
        Self::UnknownErrorCode,
        Self::RequestFailed,
        Self::ServerCancelled,
        Self::ContentModified,
        Self::RequestCancelled,
    ];

    /// Numeric code written on the wire.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerNotInitialized => -32002,
            Self::UnknownErrorCode => -32001,
            Self::RequestFailed => -32803,
            Self::ServerCancelled => -32802,
            Self::ContentModified => -32801,
            Self::RequestCancelled => -32800,
        }
    }

    /// Maps a wire code back onto a reserved code.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.code() == code)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Builds an error object for a reserved code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// The reserved code matching this error, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

/// Result or error carried by a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseOutcome {
    /// Successful result payload.
    Result(Value),
    /// Error payload.
    Error(JsonRpcError),
}

/// A JSON-RPC 2.0 response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version.
    pub jsonrpc: String,
    /// Request identifier this response answers; `null` when unknown.
    pub id: Option<RequestId>,
    /// The result on success or the error on failure.
    #[serde(flatten)]
    pub outcome: ResponseOutcome,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id),
            outcome: ResponseOutcome::Result(result),
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            outcome: ResponseOutcome::Error(error),
        }
    }

    /// The error payload, if this is an error response.
    #[must_use]
    pub fn error(&self) -> Option<&JsonRpcError> {
        match &self.outcome {
            ResponseOutcome::Error(error) => Some(error),
            ResponseOutcome::Result(_) => None,
        }
    }

    /// The result payload, if this is a success response.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Result(result) => Some(result),
            ResponseOutcome::Error(_) => None,
        }
    }
}

/// A JSON-RPC 2.0 notification sent by the server.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// Protocol version, always "2.0".
    pub jsonrpc: &'static str,
    /// The notification method.
    pub method: &'static str,
    /// Notification parameters.
    pub params: Value,
}

impl JsonRpcNotification {
    /// Creates a new notification.
    #[must_use]
    pub fn new(method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}
