//! Agent Identity
//!
//! The credentials an agent authenticates with: id, secret and an RSA
//! keypair in PEM form. Supplied by the caller; nothing here generates or
//! rotates keys.

use std::fmt;
use validator::Validate;

/// Agent credentials
#[derive(Clone, PartialEq, Eq, Validate)]
pub struct AgentIdentity {
    /// Agent identifier issued by the registry
    #[validate(length(min = 1, max = 255))]
    pub agent_id: String,

    /// Agent secret issued by the registry
    #[validate(length(min = 1))]
    pub agent_secret: String,

    /// RSA private key (PKCS#8 or PKCS#1 PEM)
    #[validate(length(min = 1))]
    pub private_key: String,

    /// RSA public key (SPKI PEM, or bare base64)
    #[validate(length(min = 1))]
    pub public_key: String,
}

impl AgentIdentity {
    /// Create a new identity
    pub fn new(
        agent_id: impl Into<String>,
        agent_secret: impl Into<String>,
        private_key: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_secret: agent_secret.into(),
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }

    /// Whether a private key is configured
    pub fn has_private_key(&self) -> bool {
        !self.private_key.trim().is_empty()
    }

    /// Whether id, secret and private key are all present
    pub fn has_token_credentials(&self) -> bool {
        !self.agent_id.is_empty() && !self.agent_secret.is_empty() && self.has_private_key()
    }
}

impl fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("agent_id", &self.agent_id)
            .field("agent_secret", &"[redacted]")
            .field("private_key", &"[redacted]")
            .field("public_key", &self.public_key)
            .finish()
    }
}
