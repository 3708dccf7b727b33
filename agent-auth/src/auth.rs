//! Agent Auth Orchestrator
//!
//! [`AgentAuth`] wraps outbound requests with a DPoP proof, an interaction
//! token and the target agent id, and verifies inbound requests by sending
//! their credentials to the registry.

use crate::cache::MemoryTokenStore;
use crate::config::AgentAuthConfig;
use crate::dpop::{DpopProofGenerator, ProofGenerator};
use crate::error::{AgentAuthError, Result};
use crate::identity::AgentIdentity;
use crate::models::{registry_error_message, VerifyTokenResponse};
use crate::normalize::normalize_url;
use crate::token_manager::{
    header_value, RegistryTokenManager, TokenManager, TokenParams, HEADER_DPOP, TOKEN_CREATE_PATH,
};
use crate::transport::{HttpTransport, RegistryTransport};
use reqwest::header::{HeaderMap, HeaderName, AUTHORIZATION};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Registry path for token verification
pub const TOKEN_VERIFY_PATH: &str = "/tokens/verify";

/// Header naming the agent a request is addressed to
pub const HEADER_TARGET_AGENT_ID: &str = "target-agent-id";

const BEARER_PREFIX: &str = "Bearer ";

/// Collaborators of an [`AgentAuth`]
pub struct AuthComponents {
    /// Signs proofs
    pub proofs: Arc<dyn ProofGenerator>,

    /// Resolves interaction tokens
    pub tokens: Arc<dyn TokenManager>,

    /// Reaches the registry verify endpoint
    pub transport: Arc<dyn RegistryTransport>,
}

impl AuthComponents {
    /// Default collaborators: RS256 proofs, in-memory token cache, `reqwest` transport
    pub fn http(registry_url: &str) -> Self {
        let transport: Arc<dyn RegistryTransport> = Arc::new(HttpTransport::new());
        let tokens = RegistryTokenManager::with_parts(
            registry_url,
            Arc::new(MemoryTokenStore::new()),
            transport.clone(),
        );

        Self {
            proofs: Arc::new(DpopProofGenerator::new()),
            tokens: Arc::new(tokens),
            transport,
        }
    }
}

/// Protects outbound and verifies inbound agent requests
pub struct AgentAuth {
    identity: AgentIdentity,
    registry_url: String,
    proofs: Arc<dyn ProofGenerator>,
    tokens: Arc<dyn TokenManager>,
    transport: Arc<dyn RegistryTransport>,
}

impl AgentAuth {
    /// Create an orchestrator with the default collaborators
    pub fn new(config: AgentAuthConfig) -> Self {
        let components = AuthComponents::http(&config.registry_url);
        Self::with_components(config.identity, &config.registry_url, components)
    }

    /// Create an orchestrator around explicit collaborators
    pub fn with_components(
        identity: AgentIdentity,
        registry_url: &str,
        components: AuthComponents,
    ) -> Self {
        info!(
            agent_id = %identity.agent_id,
            registry_url,
            "Agent auth initialized"
        );

        Self {
            identity,
            registry_url: registry_url.trim_end_matches('/').to_string(),
            proofs: components.proofs,
            tokens: components.tokens,
            transport: components.transport,
        }
    }

    /// Agent this orchestrator acts as
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Registry base URL, trailing slash removed
    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Whether a cached, unexpired token exists for `target_agent_id`
    pub fn has_valid_token(&self, target_agent_id: &str) -> bool {
        self.tokens
            .is_token_valid(&self.identity.agent_id, target_agent_id)
    }

    /// Get an interaction token for `target_agent_id`
    ///
    /// `registry_url` overrides the configured registry for this call.
    pub async fn get_interaction_token(
        &self,
        target_agent_id: &str,
        registry_url: Option<&str>,
    ) -> Result<String> {
        self.interaction_token(target_agent_id, registry_url)
            .await
            .map_err(|e| self.fail("token", e))
    }

    async fn interaction_token(
        &self,
        target_agent_id: &str,
        registry_url: Option<&str>,
    ) -> Result<String> {
        if !self.identity.has_token_credentials() {
            debug!(
                has_agent_id = !self.identity.agent_id.is_empty(),
                has_agent_secret = !self.identity.agent_secret.is_empty(),
                has_private_key = self.identity.has_private_key(),
                "Missing agent credentials"
            );
            return Err(AgentAuthError::ConfigurationError(
                "Agent credentials required for token requests".to_string(),
            ));
        }

        let base = registry_url
            .unwrap_or(&self.registry_url)
            .trim_end_matches('/');
        let endpoint = normalize_url(&format!("{}{}", base, TOKEN_CREATE_PATH), true)?;
        let registry_url = endpoint
            .strip_suffix(TOKEN_CREATE_PATH)
            .unwrap_or(&endpoint)
            .to_string();

        let proof = self
            .proofs
            .create_proof("POST", &endpoint, &self.identity.private_key)?;

        self.tokens
            .get_token(TokenParams {
                agent_id: self.identity.agent_id.clone(),
                agent_secret: self.identity.agent_secret.clone(),
                target_agent_id: target_agent_id.to_string(),
                dpop_proof: proof,
                dpop_public_key: self.identity.public_key.clone(),
                registry_url: Some(registry_url),
            })
            .await
    }

    /// Add auth headers to an outbound request
    ///
    /// Returns a copy of `headers` with `dpop`, `authorization` and
    /// `target-agent-id` set; any other header passes through.
    pub async fn protect_request(
        &self,
        method: &str,
        url: &str,
        target_agent_id: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<HeaderMap> {
        if !self.identity.has_private_key() {
            return Err(self.fail("precondition", AgentAuthError::MissingPrivateKey));
        }

        let mut headers = headers.cloned().unwrap_or_default();

        let url = normalize_url(url, false).map_err(|e| self.fail("normalize", e))?;
        let proof = self
            .proofs
            .create_proof(method, &url, &self.identity.private_key)
            .map_err(|e| self.fail("proof", e))?;

        let token = self.get_interaction_token(target_agent_id, None).await?;

        headers.insert(
            HeaderName::from_static(HEADER_DPOP),
            header_value(HEADER_DPOP, &proof).map_err(|e| self.fail("headers", e))?,
        );
        let authorization = header_value("authorization", &format!("{}{}", BEARER_PREFIX, token))
            .map_err(|_| AgentAuthError::RegistryError {
                status: 200,
                message: "Interaction token is not a valid header value".to_string(),
            })
            .map_err(|e| self.fail("headers", e))?;
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(
            HeaderName::from_static(HEADER_TARGET_AGENT_ID),
            header_value(HEADER_TARGET_AGENT_ID, target_agent_id)
                .map_err(|e| self.fail("headers", e))?,
        );

        debug!(
            method,
            url = %url,
            target_agent_id,
            token_prefix = %token_prefix(&token),
            "Request protected"
        );

        Ok(headers)
    }

    /// Verify an inbound request through the registry
    ///
    /// Resolves to `true` or fails; there is no `false` outcome.
    pub async fn verify_request(&self, method: &str, url: &str, headers: &HeaderMap) -> Result<bool> {
        let authorization = header_str(headers, AUTHORIZATION.as_str())
            .ok_or(AgentAuthError::MissingAuthorizationHeader)
            .map_err(|e| self.fail("precondition", e))?;
        header_str(headers, HEADER_DPOP)
            .ok_or(AgentAuthError::MissingDpopHeader)
            .map_err(|e| self.fail("precondition", e))?;

        if !self.identity.has_private_key() {
            return Err(self.fail("precondition", AgentAuthError::MissingPrivateKey));
        }

        let token = authorization
            .strip_prefix(BEARER_PREFIX)
            .unwrap_or(authorization);
        let target_agent_id = header_str(headers, HEADER_TARGET_AGENT_ID);

        let endpoint = normalize_url(&format!("{}{}", self.registry_url, TOKEN_VERIFY_PATH), false)
            .map_err(|e| self.fail("normalize", e))?;
        let proof = self
            .proofs
            .create_proof("POST", &endpoint, &self.identity.private_key)
            .map_err(|e| self.fail("proof", e))?;

        let verify_headers = self
            .verify_headers(token, &proof, target_agent_id)
            .map_err(|e| self.fail("headers", e))?;

        debug!(
            method,
            url,
            endpoint = %endpoint,
            token_prefix = %token_prefix(token),
            "Verifying request"
        );

        let response = self
            .transport
            .post(&endpoint, verify_headers, None)
            .await
            .map_err(|e| self.fail("verify", e))?;

        match response.status {
            200 => {
                let body = VerifyTokenResponse::parse(&response).map_err(|e| self.fail("verify", e))?;
                debug!(
                    agent_id = ?body.agent_id,
                    target_agent_id = ?body.target_agent_id,
                    "Request verified"
                );
                Ok(true)
            }
            401 => Err(self.fail("verify", AgentAuthError::InvalidCredentials)),
            status => Err(self.fail(
                "verify",
                AgentAuthError::RegistryError {
                    status,
                    message: registry_error_message(&response),
                },
            )),
        }
    }

    fn verify_headers(
        &self,
        token: &str,
        proof: &str,
        target_agent_id: Option<&str>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            header_value("authorization", &format!("{}{}", BEARER_PREFIX, token))?,
        );
        headers.insert(HeaderName::from_static(HEADER_DPOP), header_value(HEADER_DPOP, proof)?);
        if let Some(target) = target_agent_id {
            headers.insert(
                HeaderName::from_static(HEADER_TARGET_AGENT_ID),
                header_value(HEADER_TARGET_AGENT_ID, target)?,
            );
        }
        Ok(headers)
    }

    fn fail(&self, stage: &'static str, err: AgentAuthError) -> AgentAuthError {
        error!(
            stage,
            agent_id = %self.identity.agent_id,
            error = %err,
            "Agent auth failed"
        );
        err
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}
