// api-gate-core/src/lib.rs
// ============================================================================
// Module: API Gate Core Library
// Description: Public API surface for the API Gate core.
// Purpose: Expose the credential state manager and its enforcement gate.
// Dependencies: crate::{auth, fingerprint, tooling}
// ============================================================================

//! ## Overview
//! API Gate core owns the single in-memory credential used to authorize
//! outbound API calls. It exposes set/read/clear operations and the
//! enforcement gate that every protected operation must pass. The core is
//! transport-agnostic: callers hand it already-parsed values and receive typed
//! results.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod fingerprint;
pub mod tooling;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AuthError;
pub use auth::AuthState;
pub use auth::AuthStatus;
pub use auth::AuthenticatedToken;
pub use auth::MASK_PARTIAL_MIN_CHARS;
pub use auth::MASK_PLACEHOLDER;
pub use auth::MASK_VISIBLE_CHARS;
pub use auth::MaskedToken;
pub use auth::mask_token;
pub use fingerprint::token_fingerprint;
pub use tooling::AUTH_TOOL_NAME;
pub use tooling::AuthAction;
