// api-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for api-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::io::Write;
use std::path::PathBuf;

use api_gate_config::ApiGateConfig;
use api_gate_config::ConfigError;
use tempfile::TempDir;

/// Parses a TOML string into an `ApiGateConfig` without validation.
pub fn config_from_toml(toml_str: &str) -> Result<ApiGateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ApiGateConfig, toml::de::Error> {
    config_from_toml("")
}

/// Writes `contents` to `api-gate.toml` inside a fresh temp dir.
pub fn write_config(contents: &[u8]) -> std::io::Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("api-gate.toml");
    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents)?;
    Ok((dir, path))
}

/// Asserts that `result` is an error whose message contains `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
