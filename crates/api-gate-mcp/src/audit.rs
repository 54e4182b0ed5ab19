// api-gate-mcp/src/audit.rs
// ============================================================================
// Module: MCP Audit Logging
// Description: Structured audit events for MCP requests and credential changes.
// Purpose: Emit redacted audit logs without hard dependencies.
// Dependencies: api-gate-config, api-gate-core, serde
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks. Events are serialized
//! as one JSON object per line. Credential events carry a SHA-256 fingerprint
//! prefix so that set, gate, and clear records can be correlated; the token
//! itself is never written. stdout belongs to the protocol, so the default
//! sink writes to stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use api_gate_config::AuditConfig;
use api_gate_config::AuditSinkKind;
use api_gate_core::token_fingerprint;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label for an MCP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McpOutcome {
    /// The request produced a result (including tool-level `isError`).
    Ok,
    /// The request produced a JSON-RPC error.
    Error,
}

/// MCP audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct McpAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// JSON-RPC method name.
    pub method: String,
    /// Tool name when available (tools/call).
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// Tool-level error flag for tools/call results.
    pub tool_error: bool,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Inputs for [`McpAuditEvent::new`].
pub struct McpAuditEventParams {
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// JSON-RPC method name.
    pub method: String,
    /// Tool name when available.
    pub tool: Option<String>,
    /// Tool-level error flag.
    pub tool_error: bool,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

impl McpAuditEvent {
    /// Builds a request event; the outcome follows the error code.
    #[must_use]
    pub fn new(params: McpAuditEventParams) -> Self {
        Self {
            event: "mcp_request",
            timestamp_ms: now_millis(),
            request_id: params.request_id,
            method: params.method,
            tool: params.tool,
            outcome: if params.error_code.is_some() { McpOutcome::Error } else { McpOutcome::Ok },
            tool_error: params.tool_error,
            error_code: params.error_code,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        }
    }
}

/// Credential lifecycle and gate decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    /// A credential was stored.
    Set,
    /// The credential was cleared.
    Clear,
    /// The gate released the credential for a protected call.
    GateAllow,
    /// The gate refused a protected call.
    GateDeny,
}

/// Credential audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event kind.
    pub kind: AuthEventKind,
    /// Tool that triggered the event.
    pub tool: String,
    /// Credential fingerprint (sha256 prefix).
    pub token_fingerprint: Option<String>,
    /// Failure reason (for deny events).
    pub reason: Option<String>,
    /// Request identifier when provided.
    pub request_id: Option<String>,
}

impl AuthAuditEvent {
    /// Builds a credential event, fingerprinting `token` when present.
    #[must_use]
    pub fn new(
        kind: AuthEventKind,
        tool: &str,
        token: Option<&str>,
        request_id: Option<String>,
    ) -> Self {
        Self {
            event: "auth_event",
            timestamp_ms: now_millis(),
            kind,
            tool: tool.to_string(),
            token_fingerprint: token.map(token_fingerprint),
            reason: None,
            request_id,
        }
    }

    /// Attaches a failure reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for MCP request and credential events.
pub trait AuditSink: Send + Sync {
    /// Record a request event.
    fn record(&self, event: &McpAuditEvent);

    /// Record a credential event.
    fn record_auth(&self, _event: &AuthAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        write_stderr_json(event);
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        write_stderr_json(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        self.append(event);
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &McpAuditEvent) {}
}

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the file sink cannot open its log.
pub fn sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    match (config.sink, config.path.as_deref()) {
        (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
        (AuditSinkKind::File, Some(path)) => Ok(Arc::new(FileAuditSink::new(Path::new(path))?)),
        (AuditSinkKind::File, None) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "audit.path is required"))
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes one serialized event to stderr.
fn write_stderr_json<T: Serialize>(event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(std::io::stderr(), "{payload}");
    }
}

/// Returns the current time in milliseconds since the epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| duration.as_millis()).unwrap_or(0)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
