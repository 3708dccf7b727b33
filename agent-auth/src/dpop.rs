//! DPoP Proof Generation
//!
//! Builds the signed, five-minute proof-of-possession JWT that binds an HTTP
//! method and URL to the agent's RSA key. The proof header carries the public
//! JWK so the registry can check the signature without a key lookup.

use crate::error::{AgentAuthError, Result};
use crate::keys::rsa_public_parts;
use chrono::Utc;
use jsonwebtoken::jwk::{
    AlgorithmParameters, CommonParameters, Jwk, KeyAlgorithm, PublicKeyUse, RSAKeyParameters,
    RSAKeyType,
};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT `typ` header value for DPoP proofs
pub const DPOP_JWT_TYPE: &str = "dpop+jwt";

/// Proof lifetime (`exp - iat`), in seconds
pub const PROOF_LIFETIME_SECONDS: i64 = 300;

/// Nonce length in hex characters
const NONCE_LEN: usize = 32;

/// Characters of the second identifier appended to the nonce
const NONCE_SUFFIX_LEN: usize = 15;

/// DPoP proof claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpopClaims {
    /// Unique proof identifier
    pub jti: String,

    /// HTTP method, uppercased
    pub htm: String,

    /// HTTP target URL, exactly as given
    pub htu: String,

    /// Issued at (seconds since epoch)
    pub iat: i64,

    /// Expiry (seconds since epoch)
    pub exp: i64,

    /// Single-use nonce
    pub nonce: String,
}

impl DpopClaims {
    /// Create fresh claims for a request issued now
    pub fn new(method: &str, url: &str) -> Self {
        let iat = Utc::now().timestamp();

        Self {
            jti: Uuid::new_v4().to_string(),
            htm: method.to_uppercase(),
            htu: url.to_string(),
            iat,
            exp: iat + PROOF_LIFETIME_SECONDS,
            nonce: new_nonce(),
        }
    }
}

/// Two random identifiers in simple hex form, the second cut to
/// `NONCE_SUFFIX_LEN`, together `NONCE_LEN` characters
fn new_nonce() -> String {
    let prefix = Uuid::new_v4().simple().to_string();
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}",
        &prefix[..NONCE_LEN - NONCE_SUFFIX_LEN],
        &suffix[..NONCE_SUFFIX_LEN]
    )
}

/// Proof generator seam
///
/// Implementations must return a distinct proof on every call.
pub trait ProofGenerator: Send + Sync {
    /// Create a proof binding `method` and `url` to `private_key_pem`
    fn create_proof(&self, method: &str, url: &str, private_key_pem: &str) -> Result<String>;
}

/// RS256 DPoP proof generator
#[derive(Debug, Clone, Copy, Default)]
pub struct DpopProofGenerator;

impl DpopProofGenerator {
    /// Create a new proof generator
    pub fn new() -> Self {
        Self
    }
}

impl ProofGenerator for DpopProofGenerator {
    fn create_proof(&self, method: &str, url: &str, private_key_pem: &str) -> Result<String> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| AgentAuthError::SigningError(format!("Invalid RSA private key: {}", e)))?;

        let header = dpop_header(private_key_pem)?;
        let claims = DpopClaims::new(method, url);

        encode(&header, &claims, &encoding_key)
            .map_err(|e| AgentAuthError::SigningError(format!("Failed to sign DPoP proof: {}", e)))
    }
}

/// Build the proof header advertising the public half of `private_key_pem`
fn dpop_header(private_key_pem: &str) -> Result<Header> {
    let parts = rsa_public_parts(private_key_pem)?;

    let jwk = Jwk {
        common: CommonParameters {
            public_key_use: Some(PublicKeyUse::Signature),
            key_algorithm: Some(KeyAlgorithm::RS256),
            ..Default::default()
        },
        algorithm: AlgorithmParameters::RSA(RSAKeyParameters {
            key_type: RSAKeyType::RSA,
            n: parts.n,
            e: parts.e,
        }),
    };

    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some(DPOP_JWT_TYPE.to_string());
    header.jwk = Some(jwk);

    Ok(header)
}

/// Decode a proof, checking its signature against the embedded JWK and its expiry
pub fn decode_proof(proof: &str) -> Result<(Header, DpopClaims)> {
    let header = decode_header(proof)
        .map_err(|e| AgentAuthError::SigningError(format!("Malformed DPoP proof: {}", e)))?;

    if header.typ.as_deref() != Some(DPOP_JWT_TYPE) {
        return Err(AgentAuthError::SigningError(format!(
            "Unexpected proof type: {:?}",
            header.typ
        )));
    }

    let jwk = header
        .jwk
        .as_ref()
        .ok_or_else(|| AgentAuthError::SigningError("DPoP proof carries no jwk".to_string()))?;

    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| AgentAuthError::SigningError(format!("Unusable proof jwk: {}", e)))?;

    let data = decode::<DpopClaims>(proof, &key, &Validation::new(Algorithm::RS256))
        .map_err(|e| AgentAuthError::SigningError(format!("DPoP proof rejected: {}", e)))?;

    Ok((data.header, data.claims))
}
