//! Shared fixtures and helpers for session tests.

mod recording_handler;

use std::io::{self, Cursor, Read};

use serde_json::{Value, json};

use crate::error::FrameError;
use crate::transport::FrameReader;

pub use recording_handler::{CallKind, RecordingHandler, TestState};

/// Reader that hands out at most `chunk` bytes per call to simulate a pipe
/// delivering a frame in pieces.
pub struct ChunkedReader {
    data: Cursor<Vec<u8>>,
    chunk: usize,
}

impl ChunkedReader {
    /// Wraps `data`, yielding `chunk` bytes at a time.
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self {
            data: Cursor::new(data),
            chunk: chunk.max(1),
        }
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = buf.len().min(self.chunk);
        let (window, _) = buf.split_at_mut(limit);
        self.data.read(window)
    }
}

/// Frames a JSON value the way a client would.
pub fn frame(message: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(message).expect("serialise test message");
    let mut framed = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    framed.extend_from_slice(&body);
    framed
}

/// Frames each value and concatenates the result.
pub fn frames(messages: &[Value]) -> Vec<u8> {
    messages.iter().flat_map(frame).collect()
}

/// An `initialize` request with empty params.
pub fn initialize_request(id: i64) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": "initialize", "params": {}})
}

/// An `initialize` request advertising workspace folder support.
pub fn initialize_with_capabilities(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "processId": 4242,
            "capabilities": {"workspace": {"workspaceFolders": true}}
        }
    })
}

/// A request without params.
pub fn request(id: i64, method: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method})
}

/// A request with params.
pub fn request_with_params(id: i64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

/// A notification without params.
pub fn notification(method: &str) -> Value {
    json!({"jsonrpc": "2.0", "method": method})
}

/// A `textDocument/didOpen` notification for a small Rust file.
pub fn did_open() -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didOpen",
        "params": {
            "textDocument": {
                "uri": "file:///workspace/main.rs",
                "languageId": "rust",
                "version": 1,
                "text": "fn main() {}"
            }
        }
    })
}

/// Params of a hover request at the start of the sample document.
pub fn hover_params() -> Value {
    json!({
        "textDocument": {"uri": "file:///workspace/main.rs"},
        "position": {"line": 0, "character": 0}
    })
}

/// Decodes every frame the server wrote into JSON values.
pub fn decode_output(output: &[u8]) -> Vec<Value> {
    let mut reader = FrameReader::new(Cursor::new(output.to_vec()));
    let mut messages = Vec::new();
    loop {
        match reader.read_frame() {
            Ok(body) => {
                messages.push(serde_json::from_slice(&body).expect("server wrote invalid JSON"));
            }
            Err(FrameError::Io(error)) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return messages;
            }
            Err(error) => panic!("server wrote a malformed frame: {error}"),
        }
    }
}

/// Finds the response written for `id`.
pub fn response_for(messages: &[Value], id: i64) -> Option<&Value> {
    messages
        .iter()
        .find(|message| message.get("id") == Some(&json!(id)))
}

/// Error code carried by a response, if it is an error response.
pub fn error_code(response: &Value) -> Option<i64> {
    response.get("error")?.get("code")?.as_i64()
}
