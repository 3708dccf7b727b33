//! URL Normalization
//!
//! Canonical form for request and registry URLs: no query, no fragment, no
//! explicit 80/443 port. Production registry hosts are always upgraded to
//! https; everything else keeps its scheme unless the caller forces https.

use crate::error::{AgentAuthError, Result};
use url::Url;

/// Domain of the hosted production registry
pub const PRODUCTION_REGISTRY_DOMAIN: &str = "getauthed.dev";

/// Whether `host` is the production registry domain or one of its subdomains
pub fn is_production_registry_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == PRODUCTION_REGISTRY_DOMAIN
        || host
            .strip_suffix(PRODUCTION_REGISTRY_DOMAIN)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Normalize a URL
///
/// Drops the query string and fragment, drops port 80 or 443, and switches
/// the scheme to https when `force_https` is set or the host is a production
/// registry host.
pub fn normalize_url(url: &str, force_https: bool) -> Result<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| AgentAuthError::InvalidUrl(format!("{}: {}", url, e)))?;

    parsed.set_query(None);
    parsed.set_fragment(None);

    let upgrade = force_https || parsed.host_str().is_some_and(is_production_registry_host);
    if upgrade && parsed.scheme() != "https" {
        parsed
            .set_scheme("https")
            .map_err(|_| AgentAuthError::InvalidUrl(format!("{}: cannot switch to https", url)))?;
    }

    if matches!(parsed.port(), Some(80) | Some(443)) {
        parsed
            .set_port(None)
            .map_err(|_| AgentAuthError::InvalidUrl(format!("{}: cannot clear port", url)))?;
    }

    Ok(parsed.to_string())
}

/// Normalize the registry URL a token manager is constructed with
///
/// Strips a trailing slash and always upgrades `http` to `https`, whatever
/// the host. No parsing happens here; a bad URL surfaces on first use.
pub fn normalize_registry_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    match trimmed.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => trimmed.to_string(),
    }
}

/// Normalize a per-call registry URL override
///
/// Uses [`normalize_url`] without forcing https, so only production
/// registry hosts get upgraded, then strips the trailing slash so endpoint
/// paths can be appended.
pub fn normalize_registry_override(url: &str) -> Result<String> {
    let normalized = normalize_url(url, false)?;
    Ok(normalized.trim_end_matches('/').to_string())
}
