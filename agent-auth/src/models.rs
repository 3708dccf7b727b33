//! Registry wire types
//!
//! Request/response bodies of `/tokens/create` and `/tokens/verify`, and the
//! cached [`InteractionToken`] built from a successful create.

use crate::error::{AgentAuthError, Result};
use crate::transport::RegistryResponse;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Deserializer, Serialize};

/// Bearer token scoped to one (agent, target agent) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionToken {
    /// Opaque bearer token
    pub token: String,

    /// Agent the token grants access to
    pub target_agent_id: String,

    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

impl InteractionToken {
    /// Create a new interaction token
    pub fn new(
        token: impl Into<String>,
        target_agent_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            target_agent_id: target_agent_id.into(),
            expires_at,
        }
    }

    /// Whether the token is still usable at `now` (expiry strictly later)
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Whether the token is still usable right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl From<CreateTokenResponse> for InteractionToken {
    fn from(response: CreateTokenResponse) -> Self {
        Self {
            token: response.token,
            target_agent_id: response.target_agent_id,
            expires_at: response.expires_at,
        }
    }
}

/// Body of `POST /tokens/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    /// Agent the caller wants to talk to
    pub target_agent_id: String,

    /// Proof for the create call itself
    pub dpop_proof: String,
}

/// 200 body of `POST /tokens/create`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateTokenResponse {
    /// Issued bearer token
    pub token: String,

    /// Agent the token is scoped to
    pub target_agent_id: String,

    /// Absolute expiry
    #[serde(deserialize_with = "deserialize_registry_timestamp")]
    pub expires_at: DateTime<Utc>,
}

impl CreateTokenResponse {
    /// Parse and validate a 200 response body
    pub fn parse(body: &str) -> Result<Self> {
        let response: Self = serde_json::from_str(body).map_err(|e| AgentAuthError::RegistryError {
            status: 200,
            message: format!("Malformed token response: {}", e),
        })?;

        if response.token.is_empty() {
            return Err(AgentAuthError::RegistryError {
                status: 200,
                message: "Token response carries an empty token".to_string(),
            });
        }

        if HeaderValue::from_str(&response.token).is_err() {
            return Err(AgentAuthError::RegistryError {
                status: 200,
                message: "Token response carries a token that is not a valid header value"
                    .to_string(),
            });
        }

        Ok(response)
    }
}

/// 200 body of `POST /tokens/verify`
///
/// Every field is optional: the registry signals success through the status
/// code, the body only adds detail for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VerifyTokenResponse {
    /// Agent that owns the token
    #[serde(default)]
    pub agent_id: Option<String>,

    /// Agent the token is scoped to
    #[serde(default)]
    pub target_agent_id: Option<String>,

    /// Free-form status message
    #[serde(default)]
    pub message: Option<String>,
}

impl VerifyTokenResponse {
    /// Parse a 200 response; non-JSON or empty bodies carry no detail
    pub fn parse(response: &RegistryResponse) -> Result<Self> {
        if !response.is_json() || response.body.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&response.body).map_err(|e| AgentAuthError::RegistryError {
            status: response.status,
            message: format!("Malformed verify response: {}", e),
        })
    }
}

/// Error message for a failed verify call
///
/// JSON bodies with a `detail`, `error` or `message` string yield that
/// string; anything else is passed through as the raw body.
pub fn registry_error_message(response: &RegistryResponse) -> String {
    if response.is_json() {
        if let Ok(serde_json::Value::Object(map)) =
            serde_json::from_str::<serde_json::Value>(&response.body)
        {
            for field in ["detail", "error", "message"] {
                if let Some(serde_json::Value::String(message)) = map.get(field) {
                    return message.clone();
                }
            }
        }
    }

    response.body.clone()
}

/// Parse a registry timestamp
///
/// RFC 3339 is preferred; a naive ISO 8601 timestamp is read as UTC.
pub fn parse_registry_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid expires_at '{}': {}", raw, e))
}

fn deserialize_registry_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_registry_timestamp(&raw).map_err(serde::de::Error::custom)
}
