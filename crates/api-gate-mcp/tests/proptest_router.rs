//! Tool router property-based tests.
//!
//! ## Purpose
//! These tests feed randomized tool arguments into the router and check that
//! every outcome is a tool envelope, that rejected input never changes the
//! stored credential, and that the gated call is never reached without one.
//!
//! ## What is covered
//! - Unrecognized `auth` actions fail closed and leave state untouched.
//! - Unknown argument keys are rejected before any state change.
//! - Protected calls without a credential never reach the upstream caller.
//! - `auth` check output always equals the masked view of the stored token.
//!
//! ## What is intentionally out of scope
//! - JSON-RPC framing (covered by `stdio_server.rs`).
//! - Real HTTP behavior (covered by `upstream_http.rs`).
// api-gate-mcp/tests/proptest_router.rs
// ============================================================================
// Module: Tool Router Property-Based Tests
// Description: Randomized argument checks for the auth tool and the gate.
// Purpose: Ensure the router fails closed on arbitrary tool input.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use api_gate_core::AuthState;
use api_gate_core::mask_token;
use api_gate_mcp::ToolRouter;
use api_gate_mcp::tools::RequestContext;
use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;

mod common;
use crate::common::RecordingAuditSink;
use crate::common::RecordingCaller;

fn router() -> (Arc<AuthState>, Arc<RecordingCaller>, ToolRouter) {
    let auth = Arc::new(AuthState::new());
    let caller = RecordingCaller::with_status(200);
    let router = common::router_with(
        Arc::clone(&auth),
        caller.clone(),
        Arc::new(RecordingAuditSink::default()),
    );
    (auth, caller, router)
}

fn call(router: &ToolRouter, name: &str, arguments: Value) -> (bool, String) {
    let response = router.handle_tool_call(&RequestContext::stdio(), name, arguments);
    (response.is_error, response.text_content())
}

proptest! {
    #[test]
    fn unknown_actions_fail_closed(
        action in ".{0,16}".prop_filter("not a valid action", |action| {
            !matches!(action.as_str(), "set" | "check" | "clear")
        }),
        token in ".{0,24}",
    ) {
        let (auth, caller, router) = router();
        auth.set_token("existing-credential");
        let (is_error, text) = call(&router, "auth", json!({"action": action, "token": token}));
        prop_assert!(is_error);
        prop_assert!(text.starts_with("Error: Invalid action"), "{}", text);
        let stored = auth.token();
        prop_assert_eq!(stored.as_deref(), Some("existing-credential"));
        prop_assert!(caller.calls().is_empty());
    }

    #[test]
    fn unknown_argument_keys_are_rejected(
        key in "[a-z_]{1,12}".prop_filter("not a known field", |key| {
            key != "action" && key != "token"
        }),
        token in "[a-zA-Z0-9-]{1,24}",
    ) {
        let (auth, _caller, router) = router();
        let mut arguments = json!({"action": "set", "token": token});
        arguments[key.as_str()] = json!(true);
        let (is_error, text) = call(&router, "auth", arguments);
        prop_assert!(is_error);
        prop_assert!(text.starts_with("Error: Invalid arguments:"), "{}", text);
        prop_assert_eq!(auth.token(), None);
    }

    #[test]
    fn gate_blocks_arbitrary_arguments_without_credential(
        entries in prop::collection::btree_map("[a-z]{1,8}", ".{0,16}", 0..4),
    ) {
        let (_auth, caller, router) = router();
        let arguments = serde_json::to_value(entries).unwrap();
        let (is_error, text) = call(&router, "vehicle_api", arguments);
        prop_assert!(is_error);
        prop_assert_eq!(text, "Error: Authentication required. Please provide a valid token.");
        prop_assert!(caller.calls().is_empty());
    }

    #[test]
    fn check_reports_masked_view_of_stored_token(token in ".{1,40}") {
        let (auth, _caller, router) = router();
        let (is_error, _) = call(&router, "auth", json!({"action": "set", "token": token}));
        prop_assert!(!is_error);
        let stored = auth.token();
        prop_assert_eq!(stored.as_deref(), Some(token.as_str()));
        let (_, text) = call(&router, "auth", json!({"action": "check"}));
        prop_assert_eq!(text, format!("Authenticated with token: {}", mask_token(&token)));
    }
}
