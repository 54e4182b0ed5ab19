// api-gate-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Tool routing for the API Gate MCP server.
// Purpose: Map tool invocations onto credential operations and the gated call.
// Dependencies: api-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The tool router validates tool arguments and dispatches them to
//! [`AuthState`] operations or to the protected call. Every outcome, including
//! validation and authentication failures, is returned as a [`ToolResponse`]
//! envelope; failures set `isError` and never escape as panics or transport
//! errors.
//!
//! ## Invariants
//! - The protected call consults [`AuthState::require_authenticated`] first and
//!   never reaches the [`ApiCaller`] when it fails.
//! - The token handed to the caller is the one the gate released.
//! - `auth` check output only ever contains the masked token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use api_gate_core::AUTH_TOOL_NAME;
use api_gate_core::AuthAction;
use api_gate_core::AuthError;
use api_gate_core::AuthState;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditSink;
use crate::audit::AuthAuditEvent;
use crate::audit::AuthEventKind;
use crate::upstream::ApiCaller;
use crate::upstream::UpstreamError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Description advertised for the credential tool.
const AUTH_TOOL_DESCRIPTION: &str = "authenticate and manage authentication tokens";
/// Success text for `auth` set.
const TOKEN_SET_MESSAGE: &str = "Authentication token set successfully";
/// Success text for `auth` clear.
const TOKEN_CLEARED_MESSAGE: &str = "Authentication token cleared";
/// Check text when no credential is stored.
const NOT_AUTHENTICATED_MESSAGE: &str = "Not authenticated";

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request metadata threaded through tool handling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// JSON-RPC request identifier, rendered as text.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Returns a context for a stdio request.
    #[must_use]
    pub fn stdio() -> Self {
        Self::default()
    }

    /// Attaches a request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool definition used by MCP tool listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// MCP tool name.
    pub name: String,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tool resolved from an invocation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolKind {
    /// Credential management tool.
    Auth,
    /// Gated upstream call.
    Protected,
}

// ============================================================================
// SECTION: Response Envelope
// ============================================================================

/// MCP `CallToolResult` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Tool output content.
    pub content: Vec<ToolContent>,
    /// Tool-level failure flag.
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Structured metadata.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ToolResponse {
    /// Builds a successful single-text response.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: text.into(),
            }],
            is_error: false,
            meta: None,
        }
    }

    /// Builds a failed single-text response.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self::text(text).into_error()
    }

    /// Marks the response as a tool-level failure.
    #[must_use]
    pub const fn into_error(mut self) -> Self {
        self.is_error = true;
        self
    }

    /// Attaches structured metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Returns all text content joined by newlines.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|item| match item {
                ToolContent::Text {
                    text,
                } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tool output payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Text tool output.
    Text {
        /// Text payload.
        text: String,
    },
}

// ============================================================================
// SECTION: Tool Requests
// ============================================================================

/// Arguments accepted by the `auth` tool.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthToolRequest {
    /// Requested action name.
    action: String,
    /// Credential for the `set` action.
    #[serde(default)]
    token: Option<String>,
}

// ============================================================================
// SECTION: Tool Router
// ============================================================================

/// Tool router for MCP requests.
#[derive(Clone)]
pub struct ToolRouter {
    /// Credential state shared with the host.
    auth: Arc<AuthState>,
    /// Collaborator performing the protected call.
    caller: Arc<dyn ApiCaller>,
    /// Audit sink for credential events.
    audit: Arc<dyn AuditSink>,
    /// Name of the protected tool.
    protected_tool: String,
    /// Description of the protected tool.
    protected_description: String,
}

/// Configuration inputs for building a tool router.
pub struct ToolRouterConfig {
    /// Credential state shared with the host.
    pub auth: Arc<AuthState>,
    /// Collaborator performing the protected call.
    pub caller: Arc<dyn ApiCaller>,
    /// Audit sink for credential events.
    pub audit: Arc<dyn AuditSink>,
    /// Name of the protected tool.
    pub protected_tool: String,
    /// Description of the protected tool.
    pub protected_description: String,
}

impl ToolRouter {
    /// Creates a new tool router.
    #[must_use]
    pub fn new(config: ToolRouterConfig) -> Self {
        Self {
            auth: config.auth,
            caller: config.caller,
            audit: config.audit,
            protected_tool: config.protected_tool,
            protected_description: config.protected_description,
        }
    }

    /// Lists the MCP tools supported by this server.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let actions: Vec<&str> = AuthAction::all().iter().map(|action| action.as_str()).collect();
        vec![
            ToolDefinition {
                name: AUTH_TOOL_NAME.to_string(),
                description: AUTH_TOOL_DESCRIPTION.to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "action": { "type": "string", "enum": actions },
                        "token": { "type": "string" },
                    },
                    "required": ["action"],
                    "additionalProperties": false,
                }),
            },
            ToolDefinition {
                name: self.protected_tool.clone(),
                description: self.protected_description.clone(),
                input_schema: json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    /// Handles a tool call by name with JSON arguments.
    ///
    /// Failures are folded into an `isError` response.
    #[must_use]
    pub fn handle_tool_call(
        &self,
        context: &RequestContext,
        name: &str,
        arguments: Value,
    ) -> ToolResponse {
        self.dispatch(context, name, arguments).unwrap_or_else(ToolError::into_response)
    }

    /// Routes a call to its handler.
    fn dispatch(
        &self,
        context: &RequestContext,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResponse, ToolError> {
        match self.resolve(name) {
            Some(ToolKind::Auth) => self.handle_auth(context, arguments),
            Some(ToolKind::Protected) => self.handle_protected(context, arguments),
            None => Err(ToolError::UnknownTool {
                name: name.to_string(),
                available: format!("{AUTH_TOOL_NAME}, {}", self.protected_tool),
            }),
        }
    }

    /// Resolves an invocation name to a tool.
    fn resolve(&self, name: &str) -> Option<ToolKind> {
        if name == AUTH_TOOL_NAME {
            Some(ToolKind::Auth)
        } else if name == self.protected_tool {
            Some(ToolKind::Protected)
        } else {
            None
        }
    }

    /// Handles `auth` tool requests.
    fn handle_auth(
        &self,
        context: &RequestContext,
        arguments: Value,
    ) -> Result<ToolResponse, ToolError> {
        let request = decode::<AuthToolRequest>(object_arguments(arguments)?)?;
        let action = AuthAction::parse(&request.action)
            .ok_or_else(|| ToolError::UnknownAction(request.action.clone()))?;
        match action {
            AuthAction::Set => {
                let token = request
                    .token
                    .filter(|token| !token.is_empty())
                    .ok_or(ToolError::MissingToken)?;
                self.record_auth(AuthEventKind::Set, AUTH_TOOL_NAME, Some(token.as_str()), context);
                self.auth.set_token(token);
                Ok(ToolResponse::text(TOKEN_SET_MESSAGE))
            }
            AuthAction::Check => Ok(self.auth.masked_token().map_or_else(
                || ToolResponse::text(NOT_AUTHENTICATED_MESSAGE),
                |masked| ToolResponse::text(format!("Authenticated with token: {masked}")),
            )),
            AuthAction::Clear => {
                self.auth.clear_token();
                self.record_auth(AuthEventKind::Clear, AUTH_TOOL_NAME, None, context);
                Ok(ToolResponse::text(TOKEN_CLEARED_MESSAGE))
            }
        }
    }

    /// Handles the protected tool: gate first, then the upstream call.
    fn handle_protected(
        &self,
        context: &RequestContext,
        arguments: Value,
    ) -> Result<ToolResponse, ToolError> {
        object_arguments(arguments)?;
        let token = match self.auth.require_authenticated() {
            Ok(token) => token,
            Err(err) => {
                self.audit.record_auth(
                    &AuthAuditEvent::new(
                        AuthEventKind::GateDeny,
                        &self.protected_tool,
                        None,
                        context.request_id.clone(),
                    )
                    .with_reason(err.to_string()),
                );
                return Err(err.into());
            }
        };
        self.record_auth(
            AuthEventKind::GateAllow,
            &self.protected_tool,
            Some(token.as_str()),
            context,
        );
        let response = self.caller.call(token.as_str())?;
        let result = ToolResponse::text(response.summary_text()).with_meta(response.meta());
        Ok(if response.is_success() { result } else { result.into_error() })
    }

    /// Records a credential audit event.
    fn record_auth(
        &self,
        kind: AuthEventKind,
        tool: &str,
        token: Option<&str>,
        context: &RequestContext,
    ) {
        self.audit.record_auth(&AuthAuditEvent::new(kind, tool, token, context.request_id.clone()));
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors, rendered as `isError` text.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("Error: Unknown tool '{name}'. Available tools: {available}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
        /// Comma-separated recognized tool names.
        available: String,
    },
    /// Arguments failed shape validation.
    #[error("Error: Invalid arguments: {0}")]
    InvalidParams(String),
    /// `auth` action not recognized.
    #[error("Error: Invalid action '{0}'. Valid actions are: {valid}", valid = AuthAction::valid_list())]
    UnknownAction(String),
    /// `auth` set without a usable token.
    #[error("Error: Token is required for 'set' action")]
    MissingToken,
    /// Protected call attempted without a credential.
    #[error("Error: {0}")]
    Unauthenticated(#[from] AuthError),
    /// Upstream call failed before a response arrived.
    #[error("Error making API call: {0}")]
    Upstream(#[from] UpstreamError),
}

impl ToolError {
    /// Converts the error into an `isError` tool response.
    #[must_use]
    pub fn into_response(self) -> ToolResponse {
        ToolResponse::error(self.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes tool arguments into a typed request.
fn decode<T: for<'de> Deserialize<'de>>(payload: Value) -> Result<T, ToolError> {
    serde_json::from_value(payload).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Normalizes arguments to a JSON object; absent arguments become `{}`.
fn object_arguments(arguments: Value) -> Result<Value, ToolError> {
    match arguments {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(arguments),
        _ => Err(ToolError::InvalidParams("arguments must be an object".to_string())),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
