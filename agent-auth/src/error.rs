//! Error types for agent authentication

/// Result type for agent authentication operations
pub type Result<T> = std::result::Result<T, AgentAuthError>;

/// Agent authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AgentAuthError {
    /// Agent id, secret or key material missing or unusable
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// No private key configured for signing proofs
    #[error("Private key required to protect requests")]
    MissingPrivateKey,

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Proof generation failed (malformed key, encoding failure)
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Registry rejected the agent credentials (HTTP 401)
    #[error("Invalid agent credentials")]
    InvalidCredentials,

    /// Registry answered with an unexpected status or body
    #[error("Registry error ({status}): {message}")]
    RegistryError {
        /// HTTP status returned by the registry
        status: u16,
        /// Response body, or a description of the shape mismatch
        message: String,
    },

    /// Inbound request carries no `authorization` header
    #[error("Missing authorization header")]
    MissingAuthorizationHeader,

    /// Inbound request carries no `dpop` header
    #[error("Missing DPoP header")]
    MissingDpopHeader,

    /// Transport failure talking to the registry
    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl AgentAuthError {
    /// Get the HTTP status code a server should answer with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AgentAuthError::InvalidCredentials => 401,
            AgentAuthError::MissingAuthorizationHeader => 401,
            AgentAuthError::MissingDpopHeader => 400,
            AgentAuthError::InvalidUrl(_) => 400,
            AgentAuthError::RegistryError { .. } => 502,
            AgentAuthError::HttpError(_) => 502,
            AgentAuthError::ConfigurationError(_) => 500,
            AgentAuthError::MissingPrivateKey => 500,
            AgentAuthError::SigningError(_) => 500,
        }
    }

    /// Whether the failure means the caller is not authenticated, as opposed
    /// to the registry or local setup being broken
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AgentAuthError::InvalidCredentials
                | AgentAuthError::MissingAuthorizationHeader
                | AgentAuthError::MissingDpopHeader
        )
    }
}

impl From<reqwest::Error> for AgentAuthError {
    fn from(err: reqwest::Error) -> Self {
        AgentAuthError::HttpError(err.to_string())
    }
}

impl From<url::ParseError> for AgentAuthError {
    fn from(err: url::ParseError) -> Self {
        AgentAuthError::InvalidUrl(err.to_string())
    }
}
