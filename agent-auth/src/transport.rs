//! Registry transport
//!
//! The only network collaborator of the core. Everything that talks to the
//! registry goes through [`RegistryTransport`], so tests can count and script
//! calls without a socket.

use crate::error::{AgentAuthError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use tracing::debug;

/// Raw registry response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryResponse {
    /// HTTP status code
    pub status: u16,

    /// `Content-Type` header, if any
    pub content_type: Option<String>,

    /// Response body as text
    pub body: String,
}

impl RegistryResponse {
    /// Build a response with a JSON body
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    /// Build a response with a plain text body
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain".to_string()),
            body: body.into(),
        }
    }

    /// Whether the body is declared as JSON
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false)
    }
}

/// Transport used to reach the registry
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// POST to `url` with `headers` and an optional body
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<RegistryResponse>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a transport around an existing client (timeouts, proxies, TLS)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<RegistryResponse> {
        debug!(url, "POST to registry");

        let mut request = self.client.post(url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| AgentAuthError::HttpError(format!("Failed to read body: {}", e)))?;

        debug!(url, status, "Registry responded");

        Ok(RegistryResponse {
            status,
            content_type,
            body,
        })
    }
}
