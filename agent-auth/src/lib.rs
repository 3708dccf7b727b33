//! # agent-auth: DPoP Agent-to-Agent Authentication
//!
//! This crate authenticates requests between agents through a central
//! registry, using DPoP proofs bound to an RSA keypair and short-lived
//! interaction tokens scoped to a (caller, target) pair.
//!
//! ## Features
//!
//! - **Request Protection**: DPoP proof + bearer token + target agent id on outbound requests
//! - **Request Verification**: inbound credentials checked against the registry
//! - **Token Caching**: one live interaction token per (agent, target agent) pair
//! - **URL Normalization**: query/port stripping, https for the production registry
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           AGENT A                                       │
//! │  protect_request(method, url, "agent-b")                │
//! └─────────────────────────────────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   AGENT AUTH                │
//!         │   normalize URL             │
//!         │   sign DPoP proof (RS256)   │
//!         └─────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   TOKEN MANAGER             │
//!         │   cache hit → token         │
//!         │   miss → /tokens/create     │
//!         └─────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   AGENT B                   │
//!         │   verify_request(...)       │
//!         │   → /tokens/verify          │
//!         └─────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use agent_auth::{AgentAuth, AgentAuthConfig};
//!
//! # async fn run() -> agent_auth::Result<()> {
//! let auth = AgentAuth::new(AgentAuthConfig::from_env()?);
//! let headers = auth
//!     .protect_request("GET", "https://agent-b.example.com/data", "agent-b", None)
//!     .await?;
//! # let _ = headers;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod dpop;
pub mod error;
pub mod identity;
pub mod keys;
pub mod models;
pub mod normalize;
pub mod token_manager;
pub mod transport;

// Re-exports for convenience
pub use auth::{AgentAuth, AuthComponents, HEADER_TARGET_AGENT_ID, TOKEN_VERIFY_PATH};
pub use cache::{cache_key, MemoryTokenStore, TokenStore};
pub use config::AgentAuthConfig;
pub use dpop::{DpopClaims, DpopProofGenerator, ProofGenerator};
pub use error::{AgentAuthError, Result};
pub use identity::AgentIdentity;
pub use models::{CreateTokenRequest, CreateTokenResponse, InteractionToken, VerifyTokenResponse};
pub use normalize::normalize_url;
pub use token_manager::{RegistryTokenManager, TokenManager, TokenParams, TOKEN_CREATE_PATH};
pub use transport::{HttpTransport, RegistryResponse, RegistryTransport};
