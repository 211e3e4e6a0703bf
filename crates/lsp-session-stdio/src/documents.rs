//! In-memory document store served over the session loop.
//!
//! The handler keeps the text of every open document in its application state
//! and answers hover requests with the identifier under the cursor.

use std::collections::BTreeMap;

use lsp_session::{
    ClientNotification, Handler, HandlerError, Outbox, ServiceRequest, ServiceResult,
};
use lsp_types::{
    ClientCapabilities, Hover, HoverContents, HoverParams, HoverProviderCapability,
    InitializeParams, InitializeResult, MarkupContent, MarkupKind, MessageType, Position, Range,
    ServerCapabilities, ServerInfo, TextDocumentContentChangeEvent, TextDocumentSyncCapability,
    TextDocumentSyncKind, Uri,
};
use tracing::debug;

const DOCUMENTS_TARGET: &str = "lsp_session_stdio::documents";

/// Text of the documents the client has opened, keyed by URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DocumentStore {
    documents: BTreeMap<String, String>,
}

impl DocumentStore {
    /// Number of open documents.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }

    fn text(&self, uri: &Uri) -> Option<&str> {
        self.documents.get(uri.as_str()).map(String::as_str)
    }

    fn with_text(&self, uri: &Uri, text: String) -> Self {
        let mut next = self.clone();
        next.documents.insert(uri.as_str().to_owned(), text);
        next
    }

    fn without(&self, uri: &Uri) -> Self {
        let mut next = self.clone();
        next.documents.remove(uri.as_str());
        next
    }

    fn hover(&self, params: &HoverParams) -> Option<Hover> {
        let position = &params.text_document_position_params;
        let text = self.text(&position.text_document.uri)?;
        let (word, range) = word_at(text, position.position)?;
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::PlainText,
                value: word,
            }),
            range: Some(range),
        })
    }
}

/// Handler advertising full document sync and hover.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DocumentHandler;

impl Handler<DocumentStore> for DocumentHandler {
    fn on_initialize(
        &self,
        state: &DocumentStore,
        params: InitializeParams,
        outbox: &mut Outbox,
    ) -> Result<(DocumentStore, InitializeResult), HandlerError> {
        if let Some(client) = params.client_info {
            outbox.log_message(MessageType::INFO, format!("connected to {}", client.name));
        }
        let result = InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_owned(),
                version: Some(env!("CARGO_PKG_VERSION").to_owned()),
            }),
        };
        Ok((state.clone(), result))
    }

    fn on_request(
        &self,
        state: &DocumentStore,
        _capabilities: &ClientCapabilities,
        request: ServiceRequest,
        _outbox: &mut Outbox,
    ) -> Result<(DocumentStore, ServiceResult), HandlerError> {
        let result = match request {
            ServiceRequest::Shutdown => ServiceResult::Shutdown,
            ServiceRequest::Hover(params) => ServiceResult::Hover(state.hover(&params)),
            ServiceRequest::Completion(_) => ServiceResult::Completion(None),
            ServiceRequest::GotoDefinition(_) => ServiceResult::GotoDefinition(None),
            ServiceRequest::References(_) => ServiceResult::References(None),
            ServiceRequest::DocumentSymbol(_) => ServiceResult::DocumentSymbol(None),
            ServiceRequest::Formatting(_) => ServiceResult::Formatting(None),
            ServiceRequest::Rename(_) => ServiceResult::Rename(None),
            ServiceRequest::SignatureHelp(_) => ServiceResult::SignatureHelp(None),
            ServiceRequest::CodeAction(_) => ServiceResult::CodeAction(None),
            ServiceRequest::ExecuteCommand(params) => {
                return Err(HandlerError::new(format!(
                    "unsupported command '{}'",
                    params.command
                )));
            }
        };
        Ok((state.clone(), result))
    }

    fn on_notification(
        &self,
        state: &DocumentStore,
        notification: ClientNotification,
        outbox: &mut Outbox,
    ) -> Result<DocumentStore, HandlerError> {
        match notification {
            ClientNotification::DidOpen(params) => {
                let document = params.text_document;
                outbox.log_message(
                    MessageType::INFO,
                    format!("opened {}", document.uri.as_str()),
                );
                Ok(state.with_text(&document.uri, document.text))
            }
            ClientNotification::DidChange(params) => {
                let uri = params.text_document.uri;
                let mut text = state
                    .text(&uri)
                    .ok_or_else(|| {
                        HandlerError::new(format!("document '{}' is not open", uri.as_str()))
                    })?
                    .to_owned();
                for change in &params.content_changes {
                    text = apply_change(&text, change)?;
                }
                Ok(state.with_text(&uri, text))
            }
            ClientNotification::DidClose(params) => {
                let uri = params.text_document.uri;
                let next = state.without(&uri);
                outbox.publish_diagnostics(uri, Vec::new(), None);
                Ok(next)
            }
            other => {
                debug!(target: DOCUMENTS_TARGET, method = other.method(), "no action required");
                Ok(state.clone())
            }
        }
    }
}

/// Applies one content change, replacing the whole text when no range is
/// given.
fn apply_change(
    text: &str,
    change: &TextDocumentContentChangeEvent,
) -> Result<String, HandlerError> {
    let Some(range) = change.range else {
        return Ok(change.text.clone());
    };
    let (Some(start), Some(end)) = (byte_offset(text, range.start), byte_offset(text, range.end))
    else {
        return Err(HandlerError::new("change range lies outside the document"));
    };
    if start > end {
        return Err(HandlerError::new("change range ends before it starts"));
    }
    let (Some(head), Some(tail)) = (text.get(..start), text.get(end..)) else {
        return Err(HandlerError::new("change range splits a character"));
    };
    Ok([head, change.text.as_str(), tail].concat())
}

/// Byte offset of an LSP position, whose character is counted in UTF-16 code
/// units.
fn byte_offset(text: &str, position: Position) -> Option<usize> {
    let target = usize::try_from(position.line).ok()?;
    let mut line_start = 0;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        if index == target {
            let content = line.trim_end_matches(['\r', '\n']);
            return Some(line_start + column_offset(content, position.character));
        }
        line_start += line.len();
    }
    // A position on the line after the final newline addresses the end.
    (target == text.split_inclusive('\n').count()).then_some(text.len())
}

/// Byte offset within a line, clamped to the line end.
fn column_offset(line: &str, character: u32) -> usize {
    let mut units = 0;
    for (offset, ch) in line.char_indices() {
        if units >= character {
            return offset;
        }
        units += utf16_units(ch);
    }
    line.len()
}

fn utf16_units(ch: char) -> u32 {
    if u32::from(ch) > 0xFFFF { 2 } else { 1 }
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Identifier touching `position`, with its range.
fn word_at(text: &str, position: Position) -> Option<(String, Range)> {
    let line = text.lines().nth(usize::try_from(position.line).ok()?)?;
    let cursor = column_offset(line, position.character);
    let (before, after) = (line.get(..cursor)?, line.get(cursor..)?);

    let prefix: usize = before
        .chars()
        .rev()
        .take_while(|ch| is_word(*ch))
        .map(char::len_utf8)
        .sum();
    let suffix: usize = after
        .chars()
        .take_while(|ch| is_word(*ch))
        .map(char::len_utf8)
        .sum();
    let word = line.get(cursor - prefix..cursor + suffix)?;
    if word.is_empty() {
        return None;
    }

    let start: u32 = line.get(..cursor - prefix)?.chars().map(utf16_units).sum();
    let width: u32 = word.chars().map(utf16_units).sum();
    let range = Range::new(
        Position::new(position.line, start),
        Position::new(position.line, start + width),
    );
    Some((word.to_owned(), range))
}
