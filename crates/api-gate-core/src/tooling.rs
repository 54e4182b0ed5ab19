// api-gate-core/src/tooling.rs
// ============================================================================
// Module: Tooling Identifiers
// Description: Canonical credential tool and action identifiers.
// Purpose: Shared naming between the tool router and its callers.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Canonical identifiers for the credential management tool. These names are
//! part of the external tool contract surface.

use std::fmt;

/// Name of the credential management tool.
pub const AUTH_TOOL_NAME: &str = "auth";

/// Actions accepted by the credential management tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthAction {
    /// Store a credential.
    Set,
    /// Report whether a credential is stored.
    Check,
    /// Remove the stored credential.
    Clear,
}

impl AuthAction {
    /// Returns the canonical string name for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Check => "check",
            Self::Clear => "clear",
        }
    }

    /// Returns all actions in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Set, Self::Check, Self::Clear]
    }

    /// Parses an action from its string representation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "set" => Some(Self::Set),
            "check" => Some(Self::Check),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }

    /// Returns the comma-separated list of valid action names.
    #[must_use]
    pub fn valid_list() -> String {
        Self::all().iter().map(|action| action.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for AuthAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
