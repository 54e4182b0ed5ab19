// api-gate-mcp/tests/stdio_server.rs
// ============================================================================
// Module: Stdio Server Tests
// Description: End-to-end JSON-RPC sessions over in-memory streams.
// Purpose: Validate protocol handling, framing, and tool dispatch wiring.
// Dependencies: api-gate-config, api-gate-mcp
// ============================================================================

//! ## Overview
//! Feeds scripted client sessions into [`McpServer::serve`] and decodes the
//! replies written back. Covers the handshake, tool calls through the auth
//! gate, JSON-RPC error codes, and both framings.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::io::Cursor;

use api_gate_config::ApiGateConfig;
use api_gate_config::StdioFraming;
use api_gate_mcp::McpServer;
use serde_json::Value;
use serde_json::json;

use crate::common::RecordingCaller;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Server with default config and a succeeding upstream.
fn server() -> McpServer {
    common::server_with(ApiGateConfig::default(), RecordingCaller::with_status(200))
}

/// Runs a newline-framed session and returns the decoded replies.
fn session(server: &McpServer, messages: &[Value]) -> Vec<Value> {
    let mut input = String::new();
    for message in messages {
        input.push_str(&message.to_string());
        input.push('\n');
    }
    run_raw(server, &input)
}

/// Runs raw newline-framed input and returns the decoded replies.
fn run_raw(server: &McpServer, input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    server.serve(Cursor::new(input.as_bytes().to_vec()), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Builds a `tools/call` request.
fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments },
    })
}

/// Extracts the first text block of a tool result.
fn text_of(reply: &Value) -> &str {
    reply["result"]["content"][0]["text"].as_str().unwrap()
}

// ============================================================================
// SECTION: Protocol
// ============================================================================

#[test]
fn initialize_echoes_requested_protocol_version() {
    let replies = session(
        &server(),
        &[json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {} },
        })],
    );
    assert_eq!(replies.len(), 1);
    let result = &replies[0]["result"];
    assert_eq!(replies[0]["id"], json!(1));
    assert_eq!(result["protocolVersion"], json!("2024-11-05"));
    assert_eq!(result["capabilities"]["tools"]["listChanged"], json!(false));
    assert_eq!(result["serverInfo"]["name"], json!("api-mcp-server"));
}

#[test]
fn initialize_without_version_uses_default() {
    let replies =
        session(&server(), &[json!({"jsonrpc": "2.0", "id": "a", "method": "initialize"})]);
    assert_eq!(replies[0]["id"], json!("a"));
    assert_eq!(
        replies[0]["result"]["protocolVersion"],
        json!(api_gate_mcp::server::DEFAULT_PROTOCOL_VERSION)
    );
}

#[test]
fn notifications_get_no_reply() {
    let replies = session(
        &server(),
        &[
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
        ],
    );
    assert_eq!(replies, vec![json!({"jsonrpc": "2.0", "id": 2, "result": {}})]);
}

#[test]
fn null_id_is_a_request_and_gets_a_reply() {
    let replies = session(
        &server(),
        &[
            json!({"jsonrpc": "2.0", "id": null, "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": null, "method": "unknown/method"}),
        ],
    );
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], json!({"jsonrpc": "2.0", "id": null, "result": {}}));
    assert_eq!(replies[1]["id"], Value::Null);
    assert_eq!(replies[1]["error"]["code"], json!(-32601));
}

#[test]
fn tools_list_returns_both_tools() {
    let replies = session(&server(), &[json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})]);
    let tools = replies[0]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0]["name"], json!("auth"));
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["action"]));
    assert_eq!(tools[1]["name"], json!("vehicle_api"));
    assert_eq!(tools[1]["inputSchema"]["type"], json!("object"));
}

#[test]
fn json_rpc_errors_use_standard_codes_and_keep_serving() {
    let input = [
        "{not json".to_string(),
        json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}).to_string(),
        json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}).to_string(),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"arguments": {}}})
            .to_string(),
        json!({"jsonrpc": "2.0", "id": 4}).to_string(),
        json!({"jsonrpc": "2.0", "id": 5, "method": "ping"}).to_string(),
    ]
    .join("\n");
    let replies = run_raw(&server(), &input);
    let codes: Vec<Value> = replies.iter().map(|reply| reply["error"]["code"].clone()).collect();
    assert_eq!(
        codes,
        vec![
            json!(-32700),
            json!(-32600),
            json!(-32601),
            json!(-32602),
            json!(-32600),
            Value::Null
        ]
    );
    assert_eq!(replies[0]["id"], Value::Null);
    assert_eq!(replies[2]["id"], json!(2));
    assert_eq!(replies[4]["id"], json!(4));
    assert_eq!(replies[5]["result"], json!({}));
}

#[test]
fn empty_input_ends_cleanly() {
    assert!(run_raw(&server(), "").is_empty());
    assert!(run_raw(&server(), "\n\n").is_empty());
}

#[test]
fn oversized_line_is_rejected_without_ending_session() {
    let mut config = ApiGateConfig::default();
    config.server.max_body_bytes = 64;
    let server = common::server_with(config, RecordingCaller::with_status(200));
    let input = format!(
        "{}\n{}\n",
        json!({"jsonrpc": "2.0", "id": 1, "method": "ping", "params": {"pad": "x".repeat(200)}}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
    );
    let replies = run_raw(&server, &input);
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["error"]["code"], json!(-32600));
    assert_eq!(replies[0]["id"], Value::Null);
    assert_eq!(replies[1]["id"], json!(2));
}

// ============================================================================
// SECTION: Tool Calls
// ============================================================================

#[test]
fn session_sets_checks_and_calls_protected_tool() {
    let caller = RecordingCaller::with_status(200);
    let server = common::server_with(ApiGateConfig::default(), caller.clone());
    let replies = session(
        &server,
        &[
            tool_call(1, "vehicle_api", json!({})),
            tool_call(2, "auth", json!({"action": "set", "token": "token-0123456789"})),
            tool_call(3, "auth", json!({"action": "check"})),
            tool_call(4, "vehicle_api", json!({})),
            tool_call(5, "auth", json!({"action": "clear"})),
            tool_call(6, "vehicle_api", json!({})),
        ],
    );
    assert_eq!(replies.len(), 6);

    assert_eq!(replies[0]["result"]["isError"], json!(true));
    assert_eq!(
        text_of(&replies[0]),
        "Error: Authentication required. Please provide a valid token."
    );
    assert_eq!(text_of(&replies[1]), "Authentication token set successfully");
    assert!(replies[1]["result"].get("isError").is_none());
    assert_eq!(text_of(&replies[2]), "Authenticated with token: toke...6789");
    assert!(text_of(&replies[3]).starts_with("API Call Response (200 OK):"));
    assert_eq!(replies[3]["result"]["_meta"]["statusCode"], json!(200));
    assert_eq!(text_of(&replies[4]), "Authentication token cleared");
    assert_eq!(replies[5]["result"]["isError"], json!(true));

    assert_eq!(caller.calls(), vec!["token-0123456789".to_string()]);
}

#[test]
fn unknown_tool_is_a_tool_error_not_a_protocol_error() {
    let replies = session(&server(), &[tool_call(9, "nope", json!({}))]);
    assert!(replies[0].get("error").is_none());
    assert_eq!(replies[0]["result"]["isError"], json!(true));
    assert!(text_of(&replies[0]).starts_with("Error: Unknown tool 'nope'."));
}

#[test]
fn missing_arguments_are_treated_as_empty_object() {
    let replies = session(
        &server(),
        &[json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "auth" },
        })],
    );
    assert_eq!(replies[0]["result"]["isError"], json!(true));
    assert!(text_of(&replies[0]).starts_with("Error: Invalid arguments:"));
}

// ============================================================================
// SECTION: Content-Length Framing
// ============================================================================

#[test]
fn content_length_framing_round_trips() {
    let mut config = ApiGateConfig::default();
    config.server.framing = StdioFraming::ContentLength;
    let server = common::server_with(config, RecordingCaller::with_status(200));

    let mut input = Vec::new();
    for message in [
        json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}),
        tool_call(2, "auth", json!({"action": "check"})),
    ] {
        let body = message.to_string();
        input.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        input.extend_from_slice(body.as_bytes());
    }
    let mut output = Vec::new();
    server.serve(Cursor::new(input), &mut output).unwrap();

    let text = String::from_utf8(output).unwrap();
    let bodies: Vec<Value> = text
        .split("Content-Length: ")
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            let (len, body) = chunk.split_once("\r\n\r\n").unwrap();
            assert_eq!(len.parse::<usize>().unwrap(), body.len());
            serde_json::from_str(body).unwrap()
        })
        .collect();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["result"], json!({}));
    assert_eq!(text_of(&bodies[1]), "Not authenticated");
}

#[test]
fn content_length_truncated_body_is_a_transport_error() {
    let mut config = ApiGateConfig::default();
    config.server.framing = StdioFraming::ContentLength;
    let server = common::server_with(config, RecordingCaller::with_status(200));
    let mut output = Vec::new();
    let result = server.serve(Cursor::new(b"Content-Length: 50\r\n\r\n{}".to_vec()), &mut output);
    assert!(result.is_err());
    assert!(output.is_empty());
}
