// api-gate-mcp/tests/common/mod.rs
// ============================================================================
// Module: MCP Test Helpers
// Description: Shared fixtures for API Gate MCP integration tests.
// Purpose: Provide recording collaborators and router/server builders.
// ============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(clippy::unwrap_used, reason = "Test-only helpers.")]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use api_gate_config::ApiGateConfig;
use api_gate_config::HttpMethod;
use api_gate_core::AuthState;
use api_gate_mcp::ApiCaller;
use api_gate_mcp::ApiResponse;
use api_gate_mcp::McpServer;
use api_gate_mcp::ToolRouter;
use api_gate_mcp::UpstreamError;
use api_gate_mcp::audit::AuditSink;
use api_gate_mcp::audit::AuthAuditEvent;
use api_gate_mcp::audit::McpAuditEvent;
use api_gate_mcp::tools::ToolRouterConfig;
use api_gate_mcp::upstream::ResponseBody;
use serde_json::json;

/// Upstream fake that records every token it was called with.
pub struct RecordingCaller {
    /// Tokens received, in call order.
    pub calls: Mutex<Vec<String>>,
    /// Status returned by every call.
    pub status: u16,
}

impl RecordingCaller {
    /// Creates a caller answering with `status`.
    pub fn with_status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            status,
        })
    }

    /// Returns the recorded tokens.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ApiCaller for RecordingCaller {
    fn call(&self, token: &str) -> Result<ApiResponse, UpstreamError> {
        self.calls.lock().unwrap().push(token.to_string());
        Ok(ApiResponse {
            status: self.status,
            status_text: if self.status == 200 { "OK" } else { "Not Found" }.to_string(),
            url: "https://upstream.test/vehicles/".to_string(),
            method: HttpMethod::Get,
            headers: BTreeMap::from([(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            body: ResponseBody::Json(json!({ "count": 1, "results": ["sand crawler"] })),
        })
    }
}

/// Upstream fake that always fails before a response arrives.
pub struct FailingCaller;

impl ApiCaller for FailingCaller {
    fn call(&self, _token: &str) -> Result<ApiResponse, UpstreamError> {
        Err(UpstreamError::Request("connection refused".to_string()))
    }
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Serialized request events.
    pub requests: Mutex<Vec<String>>,
    /// Serialized credential events.
    pub auth: Mutex<Vec<String>>,
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        self.requests.lock().unwrap().push(serde_json::to_string(event).unwrap());
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        self.auth.lock().unwrap().push(serde_json::to_string(event).unwrap());
    }
}

/// Builds a router with default tool names over the given collaborators.
pub fn router_with(
    auth: Arc<AuthState>,
    caller: Arc<dyn ApiCaller>,
    audit: Arc<dyn AuditSink>,
) -> ToolRouter {
    let config = ApiGateConfig::default();
    ToolRouter::new(ToolRouterConfig {
        auth,
        caller,
        audit,
        protected_tool: config.upstream.tool_name,
        protected_description: config.upstream.description,
    })
}

/// Builds a server with default config and a recording caller.
pub fn server_with(config: ApiGateConfig, caller: Arc<dyn ApiCaller>) -> McpServer {
    McpServer::new(
        config,
        Arc::new(AuthState::new()),
        caller,
        Arc::new(RecordingAuditSink::default()),
    )
}
