// api-gate-core/src/auth.rs
// ============================================================================
// Module: Credential State
// Description: In-memory credential store and enforcement gate.
// Purpose: Single source of truth for the authenticated/unauthenticated state.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`AuthState`] holds at most one credential. The authenticated flag is
//! derived from the stored token on every read, so the two can never
//! disagree. All access goes through the manager's operations; the guarded
//! context is private.
//!
//! ## Invariants
//! - `is_authenticated() == token().is_some_and(|t| !t.is_empty())`.
//! - Setting an empty token is the same transition as clearing.
//! - [`AuthState::require_authenticated`] is the only enforcement gate, and
//!   the token it returns is the one that passed the check.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of characters revealed at each end of a masked token.
pub const MASK_VISIBLE_CHARS: usize = 4;
/// Tokens shorter than this (in characters) are fully masked.
pub const MASK_PARTIAL_MIN_CHARS: usize = 12;
/// Placeholder rendered for tokens too short to mask partially.
pub const MASK_PLACEHOLDER: &str = "********";

// ============================================================================
// SECTION: Status
// ============================================================================

/// Authentication state-machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No credential is stored.
    Unauthenticated,
    /// A non-empty credential is stored.
    Authenticated,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Enforcement failures raised by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The gate was consulted while no credential is stored.
    #[error("Authentication required. Please provide a valid token.")]
    AuthenticationRequired,
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Guarded credential context.
#[derive(Debug, Default)]
struct AuthContext {
    /// Stored credential; `None` when unset or cleared.
    token: Option<String>,
}

impl AuthContext {
    /// Derives the authenticated flag from the stored token.
    fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|token| !token.is_empty())
    }
}

// ============================================================================
// SECTION: Auth State
// ============================================================================

/// Credential state manager.
///
/// Construct one per credential scope and share it by reference (or `Arc`)
/// with the components that need it.
#[derive(Debug, Default)]
pub struct AuthState {
    /// Credential context; readers share, mutations are exclusive.
    context: RwLock<AuthContext>,
}

impl AuthState {
    /// Creates a manager in the unauthenticated state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a credential, replacing any previous one.
    ///
    /// No format validation is performed. An empty token clears the state.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut context = self.write();
        context.token = if token.is_empty() { None } else { Some(token) };
    }

    /// Returns a copy of the stored credential.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    /// Returns true when a non-empty credential is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Returns the current state-machine position.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        if self.is_authenticated() { AuthStatus::Authenticated } else { AuthStatus::Unauthenticated }
    }

    /// Removes the stored credential. Clearing an empty state is a no-op.
    pub fn clear_token(&self) {
        self.write().token = None;
    }

    /// Enforcement gate for protected operations.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthenticationRequired`] when no credential is
    /// stored.
    pub fn require_authenticated(&self) -> Result<AuthenticatedToken, AuthError> {
        let context = self.read();
        match context.token.as_deref() {
            Some(token) if context.is_authenticated() => {
                Ok(AuthenticatedToken(token.to_string()))
            }
            _ => Err(AuthError::AuthenticationRequired),
        }
    }

    /// Returns the masked view of the stored credential, if any.
    #[must_use]
    pub fn masked_token(&self) -> Option<MaskedToken> {
        self.read().token.as_deref().map(mask_token)
    }

    /// Acquires the context for reading, recovering from poisoning.
    fn read(&self) -> RwLockReadGuard<'_, AuthContext> {
        self.context.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the context for writing, recovering from poisoning.
    fn write(&self) -> RwLockWriteGuard<'_, AuthContext> {
        self.context.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Gate Output
// ============================================================================

/// Credential released by a successful enforcement check.
///
/// Debug and Display output never include the token value.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedToken(String);

impl AuthenticatedToken {
    /// Returns the raw token for attaching to an outbound request.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the masked view of the token.
    #[must_use]
    pub fn masked(&self) -> MaskedToken {
        mask_token(&self.0)
    }
}

impl fmt::Debug for AuthenticatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthenticatedToken({})", self.masked())
    }
}

impl fmt::Display for AuthenticatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.masked(), f)
    }
}

// ============================================================================
// SECTION: Masking
// ============================================================================

/// Partial, non-reversible display form of a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedToken(String);

impl MaskedToken {
    /// Returns the masked text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaskedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Masks a token for display.
///
/// Tokens of at least [`MASK_PARTIAL_MIN_CHARS`] characters keep a
/// four-character prefix and suffix (`abcd...wxyz`), so at least four
/// characters always stay hidden. Shorter tokens render as
/// [`MASK_PLACEHOLDER`].
/// Lengths are counted in characters, so multi-byte input is never split.
#[must_use]
pub fn mask_token(token: &str) -> MaskedToken {
    let length = token.chars().count();
    if length < MASK_PARTIAL_MIN_CHARS {
        return MaskedToken(MASK_PLACEHOLDER.to_string());
    }
    let prefix: String = token.chars().take(MASK_VISIBLE_CHARS).collect();
    let suffix: String = token.chars().skip(length - MASK_VISIBLE_CHARS).collect();
    MaskedToken(format!("{prefix}...{suffix}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
