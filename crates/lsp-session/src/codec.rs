//! Decoding of frame bodies into typed messages.

use serde_json::Value;
use tracing::{Level, debug, enabled, trace};

use crate::error::CodecError;
use crate::jsonrpc::{Envelope, RequestId};
use crate::messages::{ClientNotification, ClientRequest};

const CODEC_TARGET: &str = "lsp_session::codec";

/// A decoded client message.
///
/// Requests and notifications are told apart solely by the presence of an
/// `id` in the envelope.
#[derive(Debug, Clone)]
pub enum Message {
    /// A request expecting a response.
    Request {
        /// Identifier echoed in the response.
        id: RequestId,
        /// Typed request payload.
        request: ClientRequest,
    },
    /// A notification; never answered.
    Notification(ClientNotification),
}

impl Message {
    /// Method name of the message.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Request { request, .. } => request.method(),
            Self::Notification(notification) => notification.method(),
        }
    }
}

/// Decodes one frame body.
///
/// # Errors
///
/// Returns [`CodecError::Parse`] for malformed JSON,
/// [`CodecError::UnexpectedPacket`] when the value is not a JSON-RPC envelope,
/// and [`CodecError::Registry`] when the method or its params are not
/// recognised.
pub fn decode(body: &[u8]) -> Result<Message, CodecError> {
    let value: Value = serde_json::from_slice(body).map_err(|error| {
        debug!(
            target: CODEC_TARGET,
            payload = %String::from_utf8_lossy(body),
            error = %error,
            "discarding unparseable payload"
        );
        CodecError::Parse {
            message: error.to_string(),
        }
    })?;

    if enabled!(target: CODEC_TARGET, Level::TRACE) {
        let pretty = serde_json::to_string_pretty(&value).unwrap_or_default();
        trace!(target: CODEC_TARGET, "received message:\n{pretty}");
    }

    let raw_id = envelope_id(&value);
    let Envelope { id, method, params } =
        serde_json::from_value(value).map_err(|error| CodecError::UnexpectedPacket {
            id: raw_id,
            message: error.to_string(),
        })?;

    match id {
        Some(id) => match ClientRequest::decode(&method, params) {
            Ok(request) => Ok(Message::Request { id, request }),
            Err(source) => Err(CodecError::Registry {
                id: Some(id),
                source,
            }),
        },
        None => ClientNotification::decode(&method, params)
            .map(Message::Notification)
            .map_err(|source| CodecError::Registry { id: None, source }),
    }
}

/// Request id of a value that may not be a valid envelope.
fn envelope_id(value: &Value) -> Option<RequestId> {
    value
        .get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}
