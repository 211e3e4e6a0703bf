//! Unit tests for the dispatch loop.

use std::io::{self, Cursor};

use lsp_types::{ClientCapabilities, WorkspaceClientCapabilities};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::connection::{Connection, SessionOptions, run};
use crate::error::SessionError;
use crate::jsonrpc::{ErrorCode, JsonRpcError, JsonRpcResponse, RequestId};
use crate::session::SessionState;
use crate::tests::support::{
    CallKind, ChunkedReader, RecordingHandler, TestState, decode_output, did_open, error_code,
    frame, frames, hover_params, initialize_request, initialize_with_capabilities, notification,
    request, request_with_params, response_for,
};
use crate::transport::{FrameReader, OutboundWriter};

type MemoryConnection = Connection<Cursor<Vec<u8>>, Vec<u8>>;

#[fixture]
fn handler() -> RecordingHandler {
    RecordingHandler::default()
}

fn connection(messages: &[Value]) -> MemoryConnection {
    Connection::new(Cursor::new(frames(messages)), Vec::new())
}

/// Steps once per message, stopping early if the session closes.
fn drive(
    connection: &mut MemoryConnection,
    handler: &RecordingHandler,
    count: usize,
) -> (SessionState, TestState) {
    let mut session = SessionState::Ready;
    let mut state = TestState::default();
    for _ in 0..count {
        if session.is_closed() {
            break;
        }
        (session, state) = connection
            .step(handler, session, state)
            .expect("step failed");
    }
    (session, state)
}

#[rstest]
fn initialize_frame_produces_one_response(handler: RecordingHandler) {
    let mut connection = connection(&[initialize_request(1)]);

    let (session, state) = drive(&mut connection, &handler, 1);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 1);
    let response = response_for(&output, 1).expect("response for id 1");
    assert!(response["result"].is_object());
    assert!(response["result"]["capabilities"].is_object());
    assert!(matches!(session, SessionState::Initialized(_)));
    assert_eq!(state.revision, 1);
}

#[rstest]
fn exit_from_ready_ends_run_without_reading_further(handler: RecordingHandler) {
    let mut connection = connection(&[notification("exit")]);

    let state = connection
        .run(&handler, TestState::default())
        .expect("run must end cleanly");

    assert!(connection.output().is_empty());
    assert_eq!(state, TestState::default());
    assert!(handler.calls().is_empty());
}

#[rstest]
fn full_session_returns_the_final_state(handler: RecordingHandler) {
    let input = frames(&[
        initialize_request(1),
        notification("initialized"),
        did_open(),
        request(2, "shutdown"),
        notification("exit"),
    ]);

    let state = run(TestState::default(), &handler, Cursor::new(input), Vec::new())
        .expect("run must end cleanly");

    assert_eq!(state.revision, 5);
    assert_eq!(
        handler.calls(),
        [
            CallKind::Initialize,
            CallKind::Notification("initialized"),
            CallKind::Notification("textDocument/didOpen"),
            CallKind::Request("shutdown"),
            CallKind::Notification("exit"),
        ]
    );
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
#[case(64)]
fn chunked_input_is_handled_like_contiguous_input(
    #[case] chunk: usize,
    handler: RecordingHandler,
) {
    let input = frames(&[
        initialize_request(1),
        request(2, "shutdown"),
        notification("exit"),
    ]);
    let mut connection = Connection::new(ChunkedReader::new(input, chunk), Vec::new());

    let state = connection
        .run(&handler, TestState::default())
        .expect("run must end cleanly");

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 2);
    assert_eq!(
        response_for(&output, 2).map(|response| &response["result"]),
        Some(&Value::Null)
    );
    assert_eq!(state.revision, 3);
}

#[rstest]
fn end_of_stream_is_reported_as_a_read_error(handler: RecordingHandler) {
    let mut connection = connection(&[initialize_request(1)]);

    let error = connection
        .run(&handler, TestState::default())
        .expect_err("input ends without exit");

    assert!(matches!(
        error,
        SessionError::Read(ref source) if source.kind() == io::ErrorKind::UnexpectedEof
    ));
}

#[rstest]
fn shutdown_handle_closes_before_reading(handler: RecordingHandler) {
    let mut connection = Connection::new(Cursor::new(Vec::new()), Vec::new());
    connection.shutdown_handle().close();

    let state = connection
        .run(&handler, TestState::default())
        .expect("shutdown must not read");

    assert_eq!(state, TestState::default());
    assert!(connection.output().is_empty());
}

#[rstest]
fn closed_sessions_do_not_read(handler: RecordingHandler) {
    let mut connection = Connection::new(Cursor::new(Vec::new()), Vec::new());

    let (session, state) = connection
        .step(&handler, SessionState::Closed, TestState::default())
        .expect("closed step must not read");

    assert!(session.is_closed());
    assert_eq!(state, TestState::default());
}

#[rstest]
fn oversized_frames_are_skipped(handler: RecordingHandler) {
    let padding = "x".repeat(256);
    let oversized = request_with_params(
        9,
        "workspace/executeCommand",
        json!({"command": padding, "arguments": []}),
    );
    let input = frames(&[oversized, initialize_request(1)]);
    let options = SessionOptions {
        max_content_length: 128,
        ..SessionOptions::default()
    };
    let mut connection =
        Connection::new(Cursor::new(input), Vec::new()).with_options(options);

    let (session, _) = drive(&mut connection, &handler, 2);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 1);
    assert!(response_for(&output, 1).is_some());
    assert!(matches!(session, SessionState::Initialized(_)));
}

#[rstest]
fn handler_receives_negotiated_capabilities(handler: RecordingHandler) {
    let mut connection = connection(&[
        initialize_with_capabilities(1),
        request_with_params(2, "textDocument/hover", hover_params()),
    ]);

    let (session, _) = drive(&mut connection, &handler, 2);

    let expected = ClientCapabilities {
        workspace: Some(WorkspaceClientCapabilities {
            workspace_folders: Some(true),
            ..WorkspaceClientCapabilities::default()
        }),
        ..ClientCapabilities::default()
    };
    assert_eq!(handler.capabilities_seen(), [expected.clone()]);
    assert_eq!(session.capabilities(), Some(&expected));
}

#[rstest]
fn failed_request_keeps_state_and_discards_queued_output() {
    let handler = RecordingHandler::failing_requests();
    let mut connection = connection(&[initialize_request(1), request(2, "shutdown")]);

    let (_, state) = drive(&mut connection, &handler, 2);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 1);
    assert!(response_for(&output, 2).is_none());
    assert_eq!(state.revision, 1);
}

#[rstest]
fn successful_request_commits_queued_notifications(handler: RecordingHandler) {
    let params = json!({
        "textDocument": {"uri": "file:///workspace/main.rs"},
        "position": {"line": 0, "character": 0},
        "context": {"includeDeclaration": true}
    });
    let mut connection = connection(&[
        initialize_request(1),
        request_with_params(2, "textDocument/references", params),
    ]);

    drive(&mut connection, &handler, 2);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 3);
    assert_eq!(
        response_for(&output, 2).map(|response| &response["result"]),
        Some(&json!([]))
    );
    let log = output.last().expect("log notification");
    assert_eq!(log["method"], "window/logMessage");
    assert_eq!(log["params"]["message"], "references computed");
}

#[rstest]
fn mismatched_result_is_treated_as_a_handler_failure(handler: RecordingHandler) {
    let mut connection = connection(&[
        initialize_request(1),
        request_with_params(2, "textDocument/completion", hover_params()),
    ]);

    let (_, state) = drive(&mut connection, &handler, 2);

    let output = decode_output(connection.output());
    assert!(response_for(&output, 2).is_none());
    assert_eq!(state.revision, 1);
}

#[rstest]
fn unanswered_results_write_nothing(handler: RecordingHandler) {
    let mut connection = connection(&[
        initialize_request(1),
        request_with_params(
            2,
            "workspace/executeCommand",
            json!({"command": "noop", "arguments": []}),
        ),
    ]);

    let (_, state) = drive(&mut connection, &handler, 2);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 1);
    assert_eq!(state.revision, 2);
}

#[rstest]
fn notification_output_follows_handler_success(handler: RecordingHandler) {
    let mut connection = connection(&[initialize_request(1), did_open()]);

    drive(&mut connection, &handler, 2);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 2);
    assert_eq!(
        output.last().map(|log| &log["params"]["message"]),
        Some(&json!("opened file:///workspace/main.rs"))
    );
}

#[rstest]
fn rejected_messages_are_answered_when_configured() {
    let handler = RecordingHandler::failing_requests();
    let options = SessionOptions {
        reply_to_rejected: true,
        ..SessionOptions::default()
    };
    let input = frames(&[initialize_request(1), initialize_request(2), request(3, "shutdown")]);
    let mut connection =
        Connection::new(Cursor::new(input), Vec::new()).with_options(options);

    drive(&mut connection, &handler, 3);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 3);
    assert_eq!(
        response_for(&output, 2).and_then(error_code),
        Some(ErrorCode::InvalidRequest.code())
    );
    let failed = response_for(&output, 3).expect("failed request answered");
    assert_eq!(error_code(failed), Some(ErrorCode::RequestFailed.code()));
    assert_eq!(failed["error"]["message"], "request rejected");
}

#[rstest]
fn failed_initialize_is_answered_when_configured() {
    let handler = RecordingHandler::failing_initialize();
    let options = SessionOptions {
        reply_to_rejected: true,
        ..SessionOptions::default()
    };
    let mut connection =
        Connection::new(Cursor::new(frame(&initialize_request(1))), Vec::new())
            .with_options(options);

    let (session, _) = drive(&mut connection, &handler, 1);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 1);
    assert_eq!(
        output.first().and_then(error_code),
        Some(ErrorCode::RequestFailed.code())
    );
    assert_eq!(session, SessionState::Ready);
}

#[rstest]
#[case(b"{not json".to_vec())]
#[case(br#"{"jsonrpc":"2.0","method":"nope"}"#.to_vec())]
#[case(br#"{"jsonrpc":"2.0"}"#.to_vec())]
fn undecodable_messages_without_id_are_dropped(
    #[case] body: Vec<u8>,
    handler: RecordingHandler,
) {
    let mut input = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    input.extend_from_slice(&body);
    let mut connection = Connection::new(Cursor::new(input), Vec::new());

    let (session, state) = drive(&mut connection, &handler, 1);

    assert!(connection.output().is_empty());
    assert_eq!(session, SessionState::Ready);
    assert_eq!(state, TestState::default());
}

#[rstest]
fn malformed_envelopes_with_an_id_are_answered_before_initialize(handler: RecordingHandler) {
    let body = br#"{"jsonrpc":"2.0","id":1}"#;
    let mut input = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    input.extend_from_slice(body);
    let mut connection = Connection::new(Cursor::new(input), Vec::new());

    let (session, _) = drive(&mut connection, &handler, 1);

    let output = decode_output(connection.output());
    assert_eq!(output.len(), 1);
    assert_eq!(
        response_for(&output, 1).and_then(error_code),
        Some(ErrorCode::ServerNotInitialized.code())
    );
    assert_eq!(session, SessionState::Ready);
    assert!(handler.calls().is_empty());
}

#[rstest]
fn failing_exit_still_ends_the_run() {
    let handler = RecordingHandler::failing_notifications();
    let input = frames(&[initialize_request(1), notification("exit")]);

    let state = run(TestState::default(), &handler, Cursor::new(input), Vec::new())
        .expect("run must end cleanly");

    assert_eq!(state.revision, 1);
    assert_eq!(
        handler.calls(),
        [CallKind::Initialize, CallKind::Notification("exit")]
    );
}

#[rstest]
fn invalid_initialize_params_are_reported(handler: RecordingHandler) {
    let mut connection = connection(&[request_with_params(
        1,
        "initialize",
        json!({"processId": "not a number"}),
    )]);

    let (session, _) = drive(&mut connection, &handler, 1);

    let output = decode_output(connection.output());
    assert_eq!(
        response_for(&output, 1).and_then(error_code),
        Some(ErrorCode::InvalidParams.code())
    );
    assert_eq!(session, SessionState::Ready);
    assert!(handler.calls().is_empty());
}

#[rstest]
fn writer_output_round_trips_through_the_reader() {
    let responses = [
        JsonRpcResponse::success(RequestId::from(4), json!({"value": [1, 2, 3]})),
        JsonRpcResponse::failure(
            Some(RequestId::from("req-5")),
            JsonRpcError::new(ErrorCode::ContentModified, "document changed"),
        ),
        JsonRpcResponse::failure(None, JsonRpcError::new(ErrorCode::ParseError, "bad json")),
    ];
    let mut writer = OutboundWriter::new(Vec::new());
    for response in &responses {
        writer.write_message(response).expect("write failed");
    }

    let mut reader = FrameReader::new(Cursor::new(writer.into_inner()));
    for expected in &responses {
        let body = reader.read_frame().expect("frame");
        let decoded: JsonRpcResponse = serde_json::from_slice(&body).expect("response");
        assert_eq!(&decoded, expected);
    }
}
