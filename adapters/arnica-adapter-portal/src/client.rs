//! Arnica portal client.
//!
//! Maps [`Request`]s onto `reqwest` calls against the REST API and hands every
//! completed exchange back as a [`Response`], whatever its status code.

use std::time::Duration;

use arnica_hal::{Method, Request, Response, Transport, TransportError, TransportResult};
use arnica_jobs::config::{DEFAULT_PORTAL_URL, PortalConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{PortalError, PortalResult};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport for the Arnica portal.
///
/// Authenticates with a static Bearer token. Offline simulators accept any
/// token value, including an empty one.
pub struct PortalClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl PortalClient {
    /// Create a client from the environment.
    ///
    /// Reads the token from `AQT_TOKEN` (may be empty for offline simulators)
    /// and the base URL from `AQT_PORTAL_URL`, falling back to the production
    /// endpoint.
    pub fn new() -> PortalResult<Self> {
        let token = std::env::var("AQT_TOKEN").unwrap_or_default();
        let base_url =
            std::env::var("AQT_PORTAL_URL").unwrap_or_else(|_| DEFAULT_PORTAL_URL.to_string());
        Self::with_base_url(base_url, token)
    }

    /// Create a client for a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> PortalResult<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    /// Create a client for a custom base URL and request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> PortalResult<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(PortalError::InvalidUrl(base_url));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Create a client from the portal section of the engine configuration.
    ///
    /// Unlike [`PortalClient::new`], a missing token is an error here.
    pub fn from_config(config: &PortalConfig) -> PortalResult<Self> {
        let token = config
            .resolve_token()
            .ok_or_else(|| PortalError::MissingToken(config.token_env.clone()))?;
        Self::with_timeout(
            &config.url,
            token,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// API base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for PortalClient {
    fn name(&self) -> &str {
        "arnica-portal"
    }

    async fn send(&self, request: Request) -> TransportResult<Response> {
        let url = self.url(&request.path);
        debug!("{} {}", request.method, url);

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        let mut builder = builder.bearer_auth(&self.token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        let body = decode_body(status.is_success(), &bytes)?;

        debug!(status = status.as_u16(), "Response from {}", url);
        Ok(Response::new(status.as_u16(), body))
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connection(e.to_string())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// Parse a response body. Empty bodies are `null`; a non-JSON error page is
/// wrapped as `{"detail": <text>}`.
fn decode_body(success: bool, bytes: &[u8]) -> TransportResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(_) if !success => Ok(json!({ "detail": String::from_utf8_lossy(bytes).trim() })),
        Err(e) => Err(TransportError::Decode(e.to_string())),
    }
}
