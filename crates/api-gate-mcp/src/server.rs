// api-gate-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server over stdio using JSON-RPC 2.0.
// Purpose: Expose API Gate tools to MCP clients.
// Dependencies: api-gate-config, api-gate-core, serde_json
// ============================================================================

//! ## Overview
//! The MCP server reads JSON-RPC 2.0 messages from a byte stream, routes
//! `tools/*` methods through [`crate::tools::ToolRouter`], and writes replies
//! with the same framing. Newline-delimited framing is the default; MCP
//! `Content-Length` framing is available through configuration.
//!
//! Malformed messages are answered with JSON-RPC errors and the loop keeps
//! serving. End of input ends the loop cleanly. Only unreadable or
//! unwritable streams and broken `Content-Length` headers are fatal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;

use api_gate_config::ApiGateConfig;
use api_gate_config::StdioFraming;
use api_gate_core::AuthState;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditSink;
use crate::audit::McpAuditEvent;
use crate::audit::McpAuditEventParams;
use crate::audit::sink_from_config;
use crate::tools::RequestContext;
use crate::tools::ToolDefinition;
use crate::tools::ToolRouter;
use crate::tools::ToolRouterConfig;
use crate::upstream::ApiCaller;
use crate::upstream::HttpApiCaller;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol version reported when the client does not request one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";
/// JSON-RPC parse error code.
const PARSE_ERROR: i64 = -32700;
/// JSON-RPC invalid request code.
const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found code.
const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params code.
const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC internal error code.
const INTERNAL_ERROR: i64 = -32603;
/// Fallback reply when a response cannot be serialized.
const SERIALIZATION_FAILURE: &[u8] =
    br#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"serialization failed"}}"#;

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: ApiGateConfig,
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Audit sink for request events.
    audit: Arc<dyn AuditSink>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// The server owns a fresh, unauthenticated [`AuthState`] and an
    /// [`HttpApiCaller`] for the configured upstream.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when initialization fails.
    pub fn from_config(config: ApiGateConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let caller = HttpApiCaller::new(config.upstream.clone())
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let audit =
            sink_from_config(&config.audit).map_err(|err| McpServerError::Init(err.to_string()))?;
        Ok(Self::new(config, Arc::new(AuthState::new()), Arc::new(caller), audit))
    }

    /// Builds a server from explicit collaborators.
    #[must_use]
    pub fn new(
        config: ApiGateConfig,
        auth: Arc<AuthState>,
        caller: Arc<dyn ApiCaller>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let router = ToolRouter::new(ToolRouterConfig {
            auth,
            caller,
            audit: Arc::clone(&audit),
            protected_tool: config.upstream.tool_name.clone(),
            protected_description: config.upstream.description.clone(),
        });
        Self {
            config,
            router,
            audit,
        }
    }

    /// Serves requests over the process stdin/stdout until stdin closes.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the transport fails.
    pub fn serve_stdio(&self) -> Result<(), McpServerError> {
        self.serve(io::stdin().lock(), io::stdout().lock())
    }

    /// Serves requests from `reader`, writing replies to `writer`, until EOF.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when reading, writing, or framing fails.
    pub fn serve(&self, reader: impl Read, mut writer: impl Write) -> Result<(), McpServerError> {
        let framing = self.config.server.framing;
        let max_body_bytes = self.config.server.max_body_bytes;
        let mut reader = BufReader::new(reader);
        loop {
            let reply = match read_framed(&mut reader, framing, max_body_bytes)? {
                None => return Ok(()),
                Some(Frame::Message(bytes)) => self.handle_payload(&bytes),
                Some(Frame::Oversized(len)) => Some(self.reject_oversized(len)),
            };
            if let Some(payload) = reply {
                write_framed(&mut writer, framing, &payload)?;
            }
        }
    }

    /// Handles one JSON-RPC message and returns the encoded reply, if any.
    #[must_use]
    pub fn handle_payload(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        let outcome = self.dispatch(bytes);
        let payload = outcome.response.as_ref().map(encode);
        self.audit.record(&McpAuditEvent::new(McpAuditEventParams {
            request_id: outcome.request_id,
            method: outcome.method,
            tool: outcome.tool,
            tool_error: outcome.tool_error,
            error_code: outcome.response.as_ref().and_then(|response| {
                response.error.as_ref().map(|error| error.code)
            }),
            request_bytes: bytes.len(),
            response_bytes: payload.as_ref().map_or(0, Vec::len),
        }));
        payload
    }

    /// Builds the reply for a frame over the body limit.
    fn reject_oversized(&self, len: usize) -> Vec<u8> {
        let response = JsonRpcResponse::failure(
            Value::Null,
            INVALID_REQUEST,
            format!("request body too large ({len} bytes)"),
        );
        let payload = encode(&response);
        self.audit.record(&McpAuditEvent::new(McpAuditEventParams {
            request_id: None,
            method: String::new(),
            tool: None,
            tool_error: false,
            error_code: Some(INVALID_REQUEST),
            request_bytes: len,
            response_bytes: payload.len(),
        }));
        payload
    }

    /// Parses and dispatches a message.
    fn dispatch(&self, bytes: &[u8]) -> DispatchOutcome {
        let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
            return DispatchOutcome::reply(
                String::new(),
                None,
                JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "parse error"),
            );
        };
        let raw_id = value.get("id").cloned();
        let is_notification = raw_id.is_none();
        let id = raw_id.unwrap_or(Value::Null);
        let request = match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => request,
            Err(_) => {
                return DispatchOutcome::reply(
                    String::new(),
                    None,
                    JsonRpcResponse::failure(id, INVALID_REQUEST, "invalid json-rpc request"),
                );
            }
        };
        let method = request.method.clone();
        if is_notification {
            return DispatchOutcome::notification(method);
        }
        if request.jsonrpc != "2.0" {
            let request_id = Some(id.to_string());
            return DispatchOutcome::reply(
                method,
                request_id,
                JsonRpcResponse::failure(id, INVALID_REQUEST, "invalid json-rpc version"),
            );
        }
        self.handle_request(id, request)
    }

    /// Dispatches a validated JSON-RPC request.
    fn handle_request(&self, id: Value, request: JsonRpcRequest) -> DispatchOutcome {
        let method = request.method;
        let request_id = Some(id.to_string());
        match method.as_str() {
            "initialize" => {
                let requested = request
                    .params
                    .as_ref()
                    .and_then(|params| params.get("protocolVersion"))
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION)
                    .to_string();
                let result = json!({
                    "protocolVersion": requested,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": {
                        "name": self.config.server.name,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                });
                DispatchOutcome::reply(method, request_id, JsonRpcResponse::success(id, result))
            }
            "ping" => {
                DispatchOutcome::reply(method, request_id, JsonRpcResponse::success(id, json!({})))
            }
            "tools/list" => {
                let result = ToolListResult {
                    tools: self.router.list_tools(),
                };
                let response = serde_json::to_value(result).map_or_else(
                    |err| JsonRpcResponse::failure(id.clone(), INTERNAL_ERROR, err.to_string()),
                    |value| JsonRpcResponse::success(id.clone(), value),
                );
                DispatchOutcome::reply(method, request_id, response)
            }
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                let Ok(call) = serde_json::from_value::<ToolCallParams>(params) else {
                    return DispatchOutcome::reply(
                        method,
                        request_id,
                        JsonRpcResponse::failure(id, INVALID_PARAMS, "invalid tool params"),
                    );
                };
                let context = RequestContext::stdio().with_request_id(id.to_string());
                let result = self.router.handle_tool_call(&context, &call.name, call.arguments);
                let tool_error = result.is_error;
                let response = serde_json::to_value(result).map_or_else(
                    |err| JsonRpcResponse::failure(id.clone(), INTERNAL_ERROR, err.to_string()),
                    |value| JsonRpcResponse::success(id.clone(), value),
                );
                let mut outcome = DispatchOutcome::reply(method, request_id, response);
                outcome.tool = Some(call.name);
                outcome.tool_error = tool_error;
                outcome
            }
            _ => DispatchOutcome::reply(
                method,
                request_id,
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, "method not found"),
            ),
        }
    }
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC request payload.
///
/// The identifier is read from the raw message, since an explicit `null` id
/// still marks a request.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    const fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Result of dispatching one message, with audit fields.
struct DispatchOutcome {
    /// Method name (empty when the message could not be parsed).
    method: String,
    /// Request identifier, rendered as text.
    request_id: Option<String>,
    /// Tool name for tools/call.
    tool: Option<String>,
    /// Tool-level error flag for tools/call.
    tool_error: bool,
    /// Reply; `None` for notifications.
    response: Option<JsonRpcResponse>,
}

impl DispatchOutcome {
    /// Outcome carrying a reply.
    const fn reply(
        method: String,
        request_id: Option<String>,
        response: JsonRpcResponse,
    ) -> Self {
        Self {
            method,
            request_id,
            tool: None,
            tool_error: false,
            response: Some(response),
        }
    }

    /// Outcome for a notification.
    const fn notification(method: String) -> Self {
        Self {
            method,
            request_id: None,
            tool: None,
            tool_error: false,
            response: None,
        }
    }
}

/// Serializes a response, falling back to a fixed internal error.
fn encode(response: &JsonRpcResponse) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|_| SERIALIZATION_FAILURE.to_vec())
}

// ============================================================================
// SECTION: Framing Helpers
// ============================================================================

/// One inbound frame.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// Message body within the size limit.
    Message(Vec<u8>),
    /// Message body over the size limit (discarded); carries its length.
    Oversized(usize),
}

/// Reads the next frame; `None` at end of input.
fn read_framed(
    reader: &mut impl BufRead,
    framing: StdioFraming,
    max_body_bytes: usize,
) -> Result<Option<Frame>, McpServerError> {
    match framing {
        StdioFraming::Lines => read_line_frame(reader, max_body_bytes),
        StdioFraming::ContentLength => read_content_length_frame(reader, max_body_bytes),
    }
}

/// Reads one newline-delimited message, skipping blank lines.
fn read_line_frame(
    reader: &mut impl BufRead,
    max_body_bytes: usize,
) -> Result<Option<Frame>, McpServerError> {
    let limit = u64::try_from(max_body_bytes).unwrap_or(u64::MAX).saturating_add(2);
    loop {
        let mut buf = Vec::new();
        let read = reader
            .by_ref()
            .take(limit)
            .read_until(b'\n', &mut buf)
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        if buf.last() != Some(&b'\n') && u64::try_from(read).unwrap_or(u64::MAX) >= limit {
            let skipped = reader
                .skip_until(b'\n')
                .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
            return Ok(Some(Frame::Oversized(read.saturating_add(skipped))));
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        if line.len() > max_body_bytes {
            return Ok(Some(Frame::Oversized(line.len())));
        }
        return Ok(Some(Frame::Message(line.to_vec())));
    }
}

/// Reads one message framed with MCP `Content-Length` headers.
fn read_content_length_frame(
    reader: &mut impl BufRead,
    max_body_bytes: usize,
) -> Result<Option<Frame>, McpServerError> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if bytes == 0 {
            if saw_header {
                return Err(McpServerError::Transport("stdio closed mid-frame".to_string()));
            }
            return Ok(None);
        }
        if line.trim().is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
    }
    let len = content_length
        .ok_or_else(|| McpServerError::Transport("missing content length".to_string()))?;
    if len > max_body_bytes {
        let len_u64 = u64::try_from(len)
            .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
        io::copy(&mut reader.by_ref().take(len_u64), &mut io::sink())
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        return Ok(Some(Frame::Oversized(len)));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
    Ok(Some(Frame::Message(buf)))
}

/// Writes one framed payload and flushes.
fn write_framed(
    writer: &mut impl Write,
    framing: StdioFraming,
    payload: &[u8],
) -> Result<(), McpServerError> {
    let write_error = |_| McpServerError::Transport("stdio write failed".to_string());
    match framing {
        StdioFraming::Lines => {
            writer.write_all(payload).map_err(write_error)?;
            writer.write_all(b"\n").map_err(write_error)?;
        }
        StdioFraming::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).map_err(write_error)?;
            writer.write_all(payload).map_err(write_error)?;
        }
    }
    writer.flush().map_err(write_error)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
