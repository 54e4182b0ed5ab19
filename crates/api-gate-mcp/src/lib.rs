// api-gate-mcp/src/lib.rs
// ============================================================================
// Module: API Gate MCP
// Description: MCP server exposing credential management and a gated API call.
// Purpose: Provide MCP tool adapters over the API Gate credential state.
// Dependencies: api-gate-core, api-gate-config, reqwest, serde_json
// ============================================================================

//! ## Overview
//! API Gate MCP serves two tools over stdio JSON-RPC: `auth`, which manages
//! the in-memory credential held by [`api_gate_core::AuthState`], and a
//! configurable protected tool that forwards an authenticated request to an
//! upstream HTTP API. Every protected call passes
//! [`api_gate_core::AuthState::require_authenticated`] before any network
//! traffic is attempted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod server;
pub mod tools;
pub mod upstream;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::ToolError;
pub use tools::ToolResponse;
pub use tools::ToolRouter;
pub use upstream::ApiCaller;
pub use upstream::ApiResponse;
pub use upstream::HttpApiCaller;
pub use upstream::UpstreamError;
