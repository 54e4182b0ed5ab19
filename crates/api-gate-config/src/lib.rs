// api-gate-config/src/lib.rs
// ============================================================================
// Module: API Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for api-gate.toml semantics.
// Dependencies: api-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `api-gate-config` defines the configuration model for the API Gate MCP
//! server: server identity and framing, the protected upstream endpoint, and
//! audit routing. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
