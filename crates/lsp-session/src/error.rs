//! Error types for framing, decoding and running a session.

use std::io;

use thiserror::Error;

use crate::jsonrpc::{ErrorCode, RequestId};
use crate::messages::RegistryError;

/// Failures raised while reading one frame off the input stream.
///
/// Only [`FrameError::Io`] leaves the stream unusable; the other variants are
/// reported and the loop moves on to the next frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// I/O error (including end-of-stream) while reading headers or body.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The header block ended without a `Content-Length` line.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The `Content-Length` value was not a decimal integer.
    #[error("invalid Content-Length header value '{value}'")]
    InvalidHeader {
        /// The raw header value.
        value: String,
    },

    /// A header line exceeded the line limit; the frame was discarded.
    #[error("header line exceeds the {limit} byte limit")]
    HeaderTooLong {
        /// Longest accepted header line, in bytes.
        limit: usize,
    },

    /// The announced body exceeded the configured limit and was discarded.
    #[error("frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Announced body length.
        length: usize,
        /// Configured maximum body length.
        limit: usize,
    },
}

impl FrameError {
    /// Whether the error leaves the input stream unusable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Failures raised while turning a frame body into a typed message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The body was not syntactically valid JSON.
    #[error("failed to parse message: {message}")]
    Parse {
        /// Message reported by the JSON parser.
        message: String,
    },

    /// The JSON value did not have the JSON-RPC envelope shape.
    #[error("unexpected packet: {message}")]
    UnexpectedPacket {
        /// Request identifier, when the value carried a usable `id`.
        id: Option<RequestId>,
        /// Why the envelope was rejected.
        message: String,
    },

    /// The method registry could not decode the envelope's payload.
    #[error("{source}")]
    Registry {
        /// Request identifier, absent for notifications.
        id: Option<RequestId>,
        /// Underlying registry failure.
        #[source]
        source: RegistryError,
    },
}

impl CodecError {
    /// Request identifier of the failed message, when one was decoded.
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Registry { id, .. } | Self::UnexpectedPacket { id, .. } => id.as_ref(),
            Self::Parse { .. } => None,
        }
    }

    /// JSON-RPC error code describing the failure.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::UnexpectedPacket { .. } => ErrorCode::InvalidRequest,
            Self::Registry { source, .. } => match source {
                RegistryError::UnknownMethod { .. } => ErrorCode::MethodNotFound,
                RegistryError::InvalidParams { .. } => ErrorCode::InvalidParams,
            },
        }
    }
}

/// Failures raised while writing an outbound frame.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The payload could not be serialised.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing or flushing the output stream failed.
    #[error("failed to write outbound message: {0}")]
    Io(#[from] io::Error),
}

/// Unrecoverable failures that end the dispatch loop.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from the input stream failed or hit end-of-stream.
    #[error("failed to read from the client: {0}")]
    Read(#[source] io::Error),

    /// Writing to the output stream failed.
    #[error("failed to write to the client: {0}")]
    Write(#[source] io::Error),
}
