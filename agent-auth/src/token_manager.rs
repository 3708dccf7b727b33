//! Interaction Token Manager
//!
//! Returns a cached token for an (agent, target agent) pair while it is
//! valid, and otherwise fetches a fresh one from the registry's
//! `/tokens/create` endpoint and caches it.

use crate::cache::{cache_key, MemoryTokenStore, TokenStore};
use crate::error::{AgentAuthError, Result};
use crate::keys::strip_pem_armor;
use crate::models::{CreateTokenRequest, CreateTokenResponse, InteractionToken};
use crate::normalize::{normalize_registry_base, normalize_registry_override};
use crate::transport::{HttpTransport, RegistryTransport};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registry path for token creation
pub const TOKEN_CREATE_PATH: &str = "/tokens/create";

/// Header carrying the calling agent's id
pub const HEADER_AGENT_ID: &str = "agent-id";

/// Header carrying the calling agent's secret
pub const HEADER_AGENT_SECRET: &str = "agent-secret";

/// Header carrying the bare base64 public key
pub const HEADER_DPOP_PUBLIC_KEY: &str = "dpop-public-key";

/// Header carrying a DPoP proof
pub const HEADER_DPOP: &str = "dpop";

/// Inputs of a token request
#[derive(Clone)]
pub struct TokenParams {
    /// Calling agent
    pub agent_id: String,

    /// Calling agent's secret
    pub agent_secret: String,

    /// Agent to obtain a token for
    pub target_agent_id: String,

    /// Proof sent with the create call
    pub dpop_proof: String,

    /// Calling agent's public key, PEM or bare base64
    pub dpop_public_key: String,

    /// Registry base URL overriding the manager's own
    pub registry_url: Option<String>,
}

impl fmt::Debug for TokenParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenParams")
            .field("agent_id", &self.agent_id)
            .field("agent_secret", &"[redacted]")
            .field("target_agent_id", &self.target_agent_id)
            .field("registry_url", &self.registry_url)
            .finish_non_exhaustive()
    }
}

/// Token acquisition seam
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Whether a cached, unexpired token exists for the pair
    fn is_token_valid(&self, agent_id: &str, target_agent_id: &str) -> bool;

    /// Return a valid token for the pair, fetching one if needed
    async fn get_token(&self, params: TokenParams) -> Result<String>;
}

/// Token manager backed by the registry
pub struct RegistryTokenManager {
    registry_url: String,
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn RegistryTransport>,
}

impl RegistryTokenManager {
    /// Create a manager with an in-memory cache and an HTTP transport
    pub fn new(registry_url: &str) -> Self {
        Self::with_parts(
            registry_url,
            Arc::new(MemoryTokenStore::new()),
            Arc::new(HttpTransport::new()),
        )
    }

    /// Create a manager around a given store and transport
    pub fn with_parts(
        registry_url: &str,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn RegistryTransport>,
    ) -> Self {
        Self {
            registry_url: normalize_registry_base(registry_url),
            store,
            transport,
        }
    }

    /// Normalized registry base URL
    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Registry base for a call, honoring the override
    fn resolve_registry_url(&self, registry_url: Option<&str>) -> Result<String> {
        match registry_url {
            Some(url) => normalize_registry_override(url),
            None => Ok(self.registry_url.clone()),
        }
    }

    fn cached_token(&self, key: &str) -> Option<InteractionToken> {
        self.store.get(key).filter(InteractionToken::is_valid)
    }

    fn build_headers(params: &TokenParams) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(HEADER_AGENT_ID),
            header_value(HEADER_AGENT_ID, &params.agent_id)?,
        );

        let mut secret = header_value(HEADER_AGENT_SECRET, &params.agent_secret)?;
        secret.set_sensitive(true);
        headers.insert(HeaderName::from_static(HEADER_AGENT_SECRET), secret);

        headers.insert(
            HeaderName::from_static(HEADER_DPOP_PUBLIC_KEY),
            header_value(HEADER_DPOP_PUBLIC_KEY, &strip_pem_armor(&params.dpop_public_key))?,
        );
        headers.insert(
            HeaderName::from_static(HEADER_DPOP),
            header_value(HEADER_DPOP, &params.dpop_proof)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    async fn fetch_token(&self, params: &TokenParams) -> Result<InteractionToken> {
        let registry_url = self.resolve_registry_url(params.registry_url.as_deref())?;
        let endpoint = format!("{}{}", registry_url, TOKEN_CREATE_PATH);

        let headers = Self::build_headers(params)?;
        let body = serde_json::to_vec(&CreateTokenRequest {
            target_agent_id: params.target_agent_id.clone(),
            dpop_proof: params.dpop_proof.clone(),
        })
        .map_err(|e| AgentAuthError::HttpError(format!("Failed to encode token request: {}", e)))?;

        debug!(
            endpoint = %endpoint,
            agent_id = %params.agent_id,
            target_agent_id = %params.target_agent_id,
            "Requesting interaction token"
        );

        let response = self.transport.post(&endpoint, headers, Some(body)).await?;

        match response.status {
            200 => Ok(CreateTokenResponse::parse(&response.body)?.into()),
            401 => {
                debug!(endpoint = %endpoint, "Registry rejected agent credentials");
                Err(AgentAuthError::InvalidCredentials)
            }
            status => {
                debug!(endpoint = %endpoint, status, "Token request failed");
                Err(AgentAuthError::RegistryError {
                    status,
                    message: response.body,
                })
            }
        }
    }
}

#[async_trait]
impl TokenManager for RegistryTokenManager {
    fn is_token_valid(&self, agent_id: &str, target_agent_id: &str) -> bool {
        self.cached_token(&cache_key(agent_id, target_agent_id))
            .is_some()
    }

    async fn get_token(&self, params: TokenParams) -> Result<String> {
        let key = cache_key(&params.agent_id, &params.target_agent_id);

        if let Some(cached) = self.cached_token(&key) {
            debug!(key = %key, expires_at = %cached.expires_at, "Using cached interaction token");
            return Ok(cached.token);
        }

        let token = self.fetch_token(&params).await?;
        debug!(key = %key, expires_at = %token.expires_at, "Caching interaction token");
        self.store.set(key, token.clone());

        Ok(token.token)
    }
}

/// Build a header value, naming the header on failure
pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        AgentAuthError::ConfigurationError(format!("{} is not a valid header value", name))
    })
}
