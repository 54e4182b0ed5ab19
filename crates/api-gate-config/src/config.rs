// api-gate-config/src/config.rs
// ============================================================================
// Module: API Gate Configuration
// Description: Configuration loading and validation for API Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: api-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path is resolved from the caller, then [`CONFIG_ENV_VAR`], then the
//! default file name. Only a missing default file falls back to built-in
//! defaults; an explicitly named file that cannot be read is an error.
//! Invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use api_gate_core::AUTH_TOOL_NAME;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "api-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "API_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `server.max_body_bytes`.
const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Upper bound for `upstream.max_response_bytes`.
const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Upper bound for `upstream.timeout_ms`.
const MAX_TIMEOUT_MS: u64 = 120_000;
/// Maximum length of a tool name.
const MAX_TOOL_NAME_LENGTH: usize = 64;
/// Separator characters permitted in HTTP header names besides alphanumerics.
const HEADER_NAME_SYMBOLS: &str = "!#$%&'*+-.^_`|~";

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// API Gate configuration root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiGateConfig {
    /// MCP server identity and framing.
    #[serde(default)]
    pub server: ServerConfig,
    /// Protected upstream endpoint.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Audit sink routing.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ApiGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved.path)?;
        Self::load_resolved(&resolved)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.upstream.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Reads, parses, and validates a resolved config path.
    fn load_resolved(resolved: &ResolvedPath) -> Result<Self, ConfigError> {
        let bytes = match fs::read(&resolved.path) {
            Ok(bytes) => bytes,
            Err(err)
                if err.kind() == io::ErrorKind::NotFound
                    && resolved.source == ConfigSource::Default =>
            {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(err) => {
                return Err(ConfigError::Io(format!("{}: {err}", resolved.path.display())));
            }
        };
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }
}

// ============================================================================
// SECTION: Server Config
// ============================================================================

/// MCP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server name reported in `serverInfo`.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Stdio message framing.
    #[serde(default)]
    pub framing: StdioFraming,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            framing: StdioFraming::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates server identity and limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("server.name must be non-empty".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be at most {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Message framing used on stdin/stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StdioFraming {
    /// One JSON-RPC message per line (MCP stdio transport).
    #[default]
    Lines,
    /// `Content-Length` header framing.
    ContentLength,
}

// ============================================================================
// SECTION: Upstream Config
// ============================================================================

/// Protected upstream endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// MCP tool name exposing the protected call.
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
    /// MCP tool description.
    #[serde(default = "default_tool_description")]
    pub description: String,
    /// Upstream URL.
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// HTTP method used for the call.
    #[serde(default)]
    pub method: HttpMethod,
    /// Header carrying the credential.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    /// Optional scheme prefix for the credential (for example `Bearer`).
    #[serde(default)]
    pub auth_scheme: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Allow cleartext `http://` upstream URLs.
    #[serde(default)]
    pub allow_http: bool,
    /// User agent sent with upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            tool_name: default_tool_name(),
            description: default_tool_description(),
            url: default_upstream_url(),
            method: HttpMethod::default(),
            auth_header: default_auth_header(),
            auth_scheme: String::new(),
            timeout_ms: default_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            allow_http: false,
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    /// Validates the upstream endpoint and limits.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_tool_name(&self.tool_name)?;
        if self.description.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.description must be non-empty".to_string()));
        }
        self.validate_url()?;
        validate_header_name("upstream.auth_header", &self.auth_header)?;
        if self.auth_scheme.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            return Err(ConfigError::Invalid(
                "upstream.auth_scheme must not contain whitespace".to_string(),
            ));
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "upstream.timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "upstream.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        if self.user_agent.trim().is_empty() || self.user_agent.chars().any(char::is_control) {
            return Err(ConfigError::Invalid(
                "upstream.user_agent must be non-empty printable text".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the upstream URL scheme and host.
    fn validate_url(&self) -> Result<(), ConfigError> {
        let url = Url::parse(self.url.trim())
            .map_err(|err| ConfigError::Invalid(format!("upstream.url is invalid: {err}")))?;
        match url.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "upstream.url uses http; set upstream.allow_http = true".to_string(),
                ));
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "upstream.url scheme {other} is not supported"
                )));
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::Invalid("upstream.url must include a host".to_string()));
        }
        Ok(())
    }

    /// Returns the header value carrying `token`, with the scheme prefix applied.
    #[must_use]
    pub fn auth_header_value(&self, token: &str) -> String {
        if self.auth_scheme.is_empty() {
            token.to_string()
        } else {
            format!("{} {token}", self.auth_scheme)
        }
    }
}

/// HTTP methods supported for the upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request.
    #[default]
    Get,
    /// POST request.
    Post,
    /// PUT request.
    Put,
    /// PATCH request.
    Patch,
    /// DELETE request.
    Delete,
    /// HEAD request.
    Head,
}

impl HttpMethod {
    /// Returns the canonical method token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

// ============================================================================
// SECTION: Audit Config
// ============================================================================

/// Audit logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Audit sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path when `sink = "file"`.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, self.path.as_deref()) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.sink = \"file\" requires audit.path".to_string()))
            }
            (AuditSinkKind::Stderr | AuditSinkKind::None, _) => Ok(()),
        }
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Audit disabled.
    None,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Origin of a resolved config path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
    /// Passed by the caller.
    Explicit,
    /// Read from [`CONFIG_ENV_VAR`].
    Environment,
    /// The default file name.
    Default,
}

/// Config path plus where it came from.
#[derive(Debug, Clone)]
struct ResolvedPath {
    /// Path to read.
    path: PathBuf,
    /// Resolution source.
    source: ConfigSource,
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<ResolvedPath, ConfigError> {
    if let Some(path) = path {
        return Ok(ResolvedPath {
            path: path.to_path_buf(),
            source: ConfigSource::Explicit,
        });
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ResolvedPath {
            path: PathBuf::from(env_path),
            source: ConfigSource::Environment,
        });
    }
    Ok(ResolvedPath {
        path: PathBuf::from(DEFAULT_CONFIG_NAME),
        source: ConfigSource::Default,
    })
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates the protected tool name.
fn validate_tool_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.len() > MAX_TOOL_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "upstream.tool_name must be 1 to {MAX_TOOL_NAME_LENGTH} characters"
        )));
    }
    if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
        return Err(ConfigError::Invalid(
            "upstream.tool_name may only contain ASCII letters, digits, '_' and '-'".to_string(),
        ));
    }
    if name == AUTH_TOOL_NAME {
        return Err(ConfigError::Invalid(format!(
            "upstream.tool_name must not be the reserved name {AUTH_TOOL_NAME}"
        )));
    }
    Ok(())
}

/// Validates an HTTP header field name.
fn validate_header_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || HEADER_NAME_SYMBOLS.contains(ch)) {
        return Err(ConfigError::Invalid(format!("{field} is not a valid header name")));
    }
    Ok(())
}

/// Default server name.
fn default_server_name() -> String {
    "api-mcp-server".to_string()
}

/// Default max body size for stdio frames.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default protected tool name.
fn default_tool_name() -> String {
    "vehicle_api".to_string()
}

/// Default protected tool description.
fn default_tool_description() -> String {
    "get vehicles List from API".to_string()
}

/// Default upstream URL.
fn default_upstream_url() -> String {
    "https://swapi.py4e.com/api/vehicles/".to_string()
}

/// Default credential header.
fn default_auth_header() -> String {
    "Authorization".to_string()
}

/// Default upstream timeout.
const fn default_timeout_ms() -> u64 {
    10_000
}

/// Default upstream response limit.
const fn default_max_response_bytes() -> usize {
    4 * 1024 * 1024
}

/// Default upstream user agent.
fn default_user_agent() -> String {
    format!("api-gate/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
