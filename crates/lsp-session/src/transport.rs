//! Byte-stream framing for LSP messages.
//!
//! Every message on the wire is prefixed by a header block:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//! Only `Content-Length` is interpreted; other header lines are skipped.

use std::io::{self, BufRead, BufReader, Read, Write};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{FrameError, WriteError};
use crate::readiness::{AlwaysReady, Readiness};

const TRANSPORT_TARGET: &str = "lsp_session::transport";
const CONTENT_LENGTH: &str = "Content-Length";

/// Longest header line buffered, terminator included.
pub(crate) const MAX_HEADER_LINE: usize = 8 * 1024;

/// Reads one LSP frame at a time from an input stream.
#[derive(Debug)]
pub struct FrameReader<R, Rd = AlwaysReady> {
    reader: BufReader<R>,
    readiness: Rd,
    max_content_length: usize,
}

impl<R: Read> FrameReader<R> {
    /// Creates a reader for a stream that never blocks on readiness.
    #[must_use]
    pub fn new(input: R) -> Self {
        Self::with_readiness(input, AlwaysReady)
    }
}

impl<R: Read, Rd: Readiness> FrameReader<R, Rd> {
    /// Creates a reader that waits on `readiness` before each frame.
    #[must_use]
    pub fn with_readiness(input: R, readiness: Rd) -> Self {
        Self {
            reader: BufReader::new(input),
            readiness,
            max_content_length: crate::connection::DEFAULT_MAX_CONTENT_LENGTH,
        }
    }

    /// Sets the largest body the reader accepts.
    #[must_use]
    pub fn with_max_content_length(mut self, limit: usize) -> Self {
        self.max_content_length = limit;
        self
    }

    /// Reads the next complete frame body.
    ///
    /// Blocks until the header block and exactly `Content-Length` body bytes
    /// have arrived, however the underlying stream chunks them.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::MissingContentLength`] or
    /// [`FrameError::InvalidHeader`] when the header block is unusable,
    /// [`FrameError::HeaderTooLong`] after skipping a frame with an overlong
    /// header line,
    /// [`FrameError::FrameTooLarge`] after draining an oversized body, and
    /// [`FrameError::Io`] when the stream fails or ends mid-frame.
    pub fn read_frame(&mut self) -> Result<Vec<u8>, FrameError> {
        if self.reader.buffer().is_empty() {
            self.readiness.wait_readable()?;
        }

        let headers = self.read_headers()?;
        if headers.overlong {
            if let Some(length) = headers.announced_length() {
                self.drain(length)?;
            }
            return Err(FrameError::HeaderTooLong {
                limit: MAX_HEADER_LINE,
            });
        }

        let length = headers.content_length()?;
        if length > self.max_content_length {
            self.discard(length)?;
            return Err(FrameError::FrameTooLarge {
                length,
                limit: self.max_content_length,
            });
        }

        let mut body = Vec::with_capacity(length);
        (&mut self.reader)
            .take(byte_count(length))
            .read_to_end(&mut body)?;
        if body.len() < length {
            return Err(unexpected_eof("connection closed while reading body"));
        }

        trace!(target: TRANSPORT_TARGET, length, "read frame");
        Ok(body)
    }

    fn read_headers(&mut self) -> Result<HeaderBlock, FrameError> {
        let mut headers = HeaderBlock::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = (&mut self.reader)
                .take(byte_count(MAX_HEADER_LINE))
                .read_until(b'\n', &mut line)?;
            if read == 0 {
                return Err(unexpected_eof("connection closed while reading headers"));
            }
            if line.last() != Some(&b'\n') {
                if read < MAX_HEADER_LINE {
                    return Err(unexpected_eof("connection closed while reading headers"));
                }
                warn!(
                    target: TRANSPORT_TARGET,
                    limit = MAX_HEADER_LINE,
                    "skipping overlong header line"
                );
                self.reader.skip_until(b'\n')?;
                headers.overlong = true;
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                return Ok(headers);
            }
            headers.record(trimmed);
        }
    }

    fn discard(&mut self, length: usize) -> Result<(), FrameError> {
        warn!(
            target: TRANSPORT_TARGET,
            length,
            limit = self.max_content_length,
            "discarding oversized frame"
        );
        self.drain(length)
    }

    fn drain(&mut self, length: usize) -> Result<(), FrameError> {
        let drained = io::copy(
            &mut (&mut self.reader).take(byte_count(length)),
            &mut io::sink(),
        )?;
        if drained < byte_count(length) {
            return Err(unexpected_eof("connection closed while discarding body"));
        }
        Ok(())
    }
}

/// Header values collected up to the blank line.
#[derive(Debug, Default)]
struct HeaderBlock {
    content_length: Option<Result<usize, String>>,
    overlong: bool,
}

impl HeaderBlock {
    fn record(&mut self, line: &str) {
        let Some((name, value)) = line.split_once(':') else {
            debug!(target: TRANSPORT_TARGET, line, "ignoring malformed header line");
            return;
        };
        if !name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            return;
        }
        let value = value.trim();
        self.content_length = Some(value.parse().map_err(|_| value.to_owned()));
    }

    fn announced_length(&self) -> Option<usize> {
        self.content_length.as_ref()?.as_ref().ok().copied()
    }

    fn content_length(self) -> Result<usize, FrameError> {
        match self.content_length {
            Some(Ok(length)) => Ok(length),
            Some(Err(value)) => Err(FrameError::InvalidHeader { value }),
            None => Err(FrameError::MissingContentLength),
        }
    }
}

fn byte_count(length: usize) -> u64 {
    u64::try_from(length).unwrap_or(u64::MAX)
}

fn unexpected_eof(message: &'static str) -> FrameError {
    FrameError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, message))
}

/// Writes LSP-framed messages to an output stream.
#[derive(Debug)]
pub struct OutboundWriter<W> {
    writer: W,
}

impl<W: Write> OutboundWriter<W> {
    /// Wraps an output stream.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialises `message` to JSON and sends it as one frame.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Encode`] if serialisation fails and
    /// [`WriteError::Io`] if writing or flushing fails.
    pub fn write_message<T: Serialize>(&mut self, message: &T) -> Result<(), WriteError> {
        let body = serde_json::to_vec(message)?;
        self.send(&body)?;
        Ok(())
    }

    /// Sends an already-encoded body as one frame and flushes.
    ///
    /// The header and body go out in a single write so a frame is never
    /// interleaved with other output.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if writing or flushing fails.
    pub fn send(&mut self, body: &[u8]) -> io::Result<()> {
        let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());
        let mut frame = Vec::with_capacity(header.len() + body.len());
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(body);

        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        trace!(target: TRANSPORT_TARGET, length = body.len(), "wrote frame");
        Ok(())
    }

    /// Borrows the underlying stream.
    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwraps the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}
