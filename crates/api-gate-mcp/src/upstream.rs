// api-gate-mcp/src/upstream.rs
// ============================================================================
// Module: Upstream API Caller
// Description: Authenticated outbound HTTP call behind the protected tool.
// Purpose: Forward the released credential to the configured upstream API.
// Dependencies: api-gate-config, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`ApiCaller`] is the seam between the tool router and the network. The
//! router only invokes it after the auth gate has released a token, and hands
//! it that token. [`HttpApiCaller`] issues one bounded request with redirects
//! disabled, a fixed timeout, and a capped body read. The body is decoded as
//! JSON when the response declares a JSON content type and kept as text
//! otherwise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use api_gate_config::HttpMethod;
use api_gate_config::UpstreamConfig;
use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Caller Trait
// ============================================================================

/// Outbound API collaborator invoked by the protected tool.
pub trait ApiCaller: Send + Sync {
    /// Performs the upstream call with `token` attached.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] when the request cannot be completed.
    fn call(&self, token: &str) -> Result<ApiResponse, UpstreamError>;
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Decoded upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for the status.
    pub status_text: String,
    /// Requested URL.
    pub url: String,
    /// Request method.
    pub method: HttpMethod,
    /// Response headers (lowercase names, repeated values comma-joined).
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Renders the human-readable tool text for the response.
    #[must_use]
    pub fn summary_text(&self) -> String {
        let heading = if self.status_text.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.status_text)
        };
        format!(
            "API Call Response ({heading}):\nStatus: {status}\nURL: {url}\nMethod: \
             {method}\nResponse:\n{body}",
            status = self.status,
            url = self.url,
            method = self.method.as_str(),
            body = self.body.render(),
        )
    }

    /// Returns the structured `_meta` payload for the response.
    #[must_use]
    pub fn meta(&self) -> Value {
        json!({
            "statusCode": self.status,
            "headers": self.headers,
            "responseData": self.body.to_value(),
        })
    }
}

/// Upstream response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Parsed JSON body.
    Json(Value),
    /// Raw text body.
    Text(String),
}

impl ResponseBody {
    /// Decodes a body according to its content type.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidJson`] when a JSON content type carries
    /// a body that does not parse.
    pub fn decode(content_type: &str, bytes: &[u8]) -> Result<Self, UpstreamError> {
        if content_type.to_ascii_lowercase().contains("application/json") {
            let value = serde_json::from_slice(bytes)
                .map_err(|err| UpstreamError::InvalidJson(err.to_string()))?;
            return Ok(Self::Json(value));
        }
        Ok(Self::Text(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Renders JSON pretty-printed and text verbatim.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Text(text) => text.clone(),
        }
    }

    /// Returns the body as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
        }
    }
}

// ============================================================================
// SECTION: HTTP Caller
// ============================================================================

/// Upstream caller backed by a blocking reqwest client.
pub struct HttpApiCaller {
    /// Upstream settings.
    config: UpstreamConfig,
    /// Parsed upstream URL.
    url: Url,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpApiCaller {
    /// Creates an HTTP caller for the configured upstream.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] when the URL is not allowed or the HTTP client
    /// cannot be created.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let url = Url::parse(config.url.trim())
            .map_err(|err| UpstreamError::InvalidUrl(err.to_string()))?;
        validate_url(&url, config.allow_http)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| UpstreamError::Client(err.to_string()))?;
        Ok(Self {
            config,
            url,
            client,
        })
    }
}

impl ApiCaller for HttpApiCaller {
    fn call(&self, token: &str) -> Result<ApiResponse, UpstreamError> {
        let mut response = self
            .client
            .request(reqwest_method(self.config.method), self.url.clone())
            .header(self.config.auth_header.as_str(), self.config.auth_header_value(token))
            .send()
            .map_err(|err| UpstreamError::Request(err.without_url().to_string()))?;
        let status = response.status();
        let headers = collect_headers(&response);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = read_response_limited(&mut response, self.config.max_response_bytes)?;
        Ok(ApiResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url: self.url.to_string(),
            method: self.config.method,
            headers,
            body: ResponseBody::decode(&content_type, &bytes)?,
        })
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upstream call failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// HTTP client construction failed.
    #[error("http client build failed: {0}")]
    Client(String),
    /// Upstream URL is malformed or uses a disallowed scheme.
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
    /// Request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(String),
    /// Response body exceeded the configured limit.
    #[error("response exceeds {0} bytes")]
    ResponseTooLarge(usize),
    /// Response body could not be read.
    #[error("failed to read response: {0}")]
    Body(String),
    /// JSON content type with an unparseable body.
    #[error("invalid json response: {0}")]
    InvalidJson(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps the configured method onto reqwest's method type.
const fn reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

/// Enforces the scheme policy on the upstream URL.
fn validate_url(url: &Url, allow_http: bool) -> Result<(), UpstreamError> {
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        other => return Err(UpstreamError::InvalidUrl(format!("unsupported scheme {other}"))),
    }
    if url.host_str().is_none() {
        return Err(UpstreamError::InvalidUrl("url host required".to_string()));
    }
    Ok(())
}

/// Flattens response headers into a sorted map.
fn collect_headers(response: &Response) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, UpstreamError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| UpstreamError::Body("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(UpstreamError::ResponseTooLarge(max_bytes));
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|err| UpstreamError::Body(err.to_string()))?;
    if buf.len() > max_bytes {
        return Err(UpstreamError::ResponseTooLarge(max_bytes));
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
