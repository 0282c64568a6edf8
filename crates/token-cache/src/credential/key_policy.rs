//! Cache key host derivation
//!
//! Id and MFA tokens belong to the service account, so they are keyed by the
//! service host. OAuth tokens are issued by the identity provider and are
//! valid for every deployment trusting it, so when a token endpoint is
//! configured they are keyed by that endpoint's host instead. Two service
//! deployments sharing one identity provider therefore share the entry.

use url::Url;

use super::CredentialKind;
use crate::error::{CacheError, Result};

/// Derive the host component of the cache key
pub fn derive_host(
    kind: CredentialKind,
    service_host: &str,
    oauth_token_endpoint: Option<&str>,
) -> Result<String> {
    match oauth_token_endpoint {
        Some(endpoint) if kind.is_oauth() => host_of(endpoint),
        _ => Ok(service_host.to_string()),
    }
}

/// Parse a URL and return its host component exactly as written
///
/// The URL parser validates the input but normalizes the host it reports,
/// e.g. lowercasing it. Cache keys are byte strings, so the host is sliced
/// from the input instead.
pub fn host_of(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw).map_err(|e| {
        CacheError::InvalidConfiguration(format!("Invalid URL '{}': {}", raw, e))
    })?;

    let no_host = || CacheError::InvalidConfiguration(format!("URL '{}' has no host", raw));
    match parsed.host_str() {
        Some(host) if !host.is_empty() => written_host(raw)
            .map(str::to_string)
            .ok_or_else(no_host),
        _ => Err(no_host()),
    }
}

/// Host slice of an already validated URL: between the scheme separator and
/// the port, path, query or fragment, without userinfo
fn written_host(raw: &str) -> Option<&str> {
    let (_, rest) = raw.trim().split_once(':')?;
    let rest = rest.trim_start_matches(&['/', '\\'][..]);

    let authority_end = rest.find(&['/', '\\', '?', '#'][..]).unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    let host = if host_port.starts_with('[') {
        &host_port[..=host_port.find(']')?]
    } else {
        host_port.split(':').next()?
    };
    Some(host).filter(|host| !host.is_empty())
}
