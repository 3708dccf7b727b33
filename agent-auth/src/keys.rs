//! PEM key handling
//!
//! The registry wants bare base64 key blobs in headers and the proof header
//! wants the RSA modulus/exponent, so both are derived here from the PEM
//! strings the caller supplies.

use crate::error::{AgentAuthError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ring::signature::{RsaKeyPair, RsaPublicKeyComponents};

const PEM_BOUNDARY: &str = "-----";

/// Remove `-----BEGIN ...-----` / `-----END ...-----` lines and all whitespace
///
/// A string without PEM armor comes back unchanged apart from whitespace.
pub fn strip_pem_armor(pem: &str) -> String {
    let mut out = String::with_capacity(pem.len());
    let mut rest = pem;

    while let Some(start) = rest.find(PEM_BOUNDARY) {
        out.push_str(&rest[..start]);
        let label = &rest[start + PEM_BOUNDARY.len()..];
        match label.find(PEM_BOUNDARY) {
            Some(end) => rest = &label[end + PEM_BOUNDARY.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }

    out.push_str(rest);
    out.retain(|c| !c.is_whitespace());
    out
}

/// RSA public key material in JWK encoding (base64url, no padding)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicParts {
    /// Modulus
    pub n: String,
    /// Public exponent
    pub e: String,
}

/// Derive the public modulus and exponent from an RSA private key PEM
///
/// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`).
/// Keys below 2048 bits are rejected.
pub fn rsa_public_parts(private_key_pem: &str) -> Result<RsaPublicParts> {
    let der = STANDARD
        .decode(strip_pem_armor(private_key_pem))
        .map_err(|e| AgentAuthError::SigningError(format!("Private key is not PEM: {}", e)))?;

    let key_pair = if private_key_pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaKeyPair::from_der(&der)
    } else {
        RsaKeyPair::from_pkcs8(&der)
    }
    .map_err(|e| AgentAuthError::SigningError(format!("Invalid RSA private key: {}", e)))?;

    let components: RsaPublicKeyComponents<Vec<u8>> = key_pair.public().into();

    Ok(RsaPublicParts {
        n: URL_SAFE_NO_PAD.encode(&components.n),
        e: URL_SAFE_NO_PAD.encode(&components.e),
    })
}
