//! In-progress login state the cache reads from and fills

use super::key_policy::{derive_host, host_of};
use super::{CachedSecret, CredentialKind};
use crate::error::Result;

/// Login attempt state shared with the credential cache
#[derive(Debug, Clone, Default)]
pub struct LoginContext {
    /// Service endpoint URL, e.g. `https://acct.example.com`
    pub server_url: String,
    pub username: String,
    /// OAuth token request endpoint of the identity provider, if configured
    pub oauth_token_request_url: Option<String>,

    pub id_token: Option<CachedSecret>,
    pub mfa_token: Option<CachedSecret>,
    pub oauth_access_token: Option<CachedSecret>,
    pub oauth_refresh_token: Option<CachedSecret>,
}

impl LoginContext {
    pub fn new(server_url: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Set the identity provider token endpoint
    pub fn with_oauth_token_request_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_token_request_url = Some(url.into());
        self
    }

    /// Host of the service endpoint
    pub fn service_host(&self) -> Result<String> {
        host_of(&self.server_url)
    }

    /// Host the cache entry for `kind` is keyed by
    pub fn cache_host(&self, kind: CredentialKind) -> Result<String> {
        derive_host(
            kind,
            &self.service_host()?,
            self.oauth_token_request_url.as_deref(),
        )
    }

    /// The slot holding credentials of `kind`
    pub fn token(&self, kind: CredentialKind) -> Option<&CachedSecret> {
        match kind {
            CredentialKind::IdToken => self.id_token.as_ref(),
            CredentialKind::MfaToken => self.mfa_token.as_ref(),
            CredentialKind::OAuthAccessToken => self.oauth_access_token.as_ref(),
            CredentialKind::OAuthRefreshToken => self.oauth_refresh_token.as_ref(),
        }
    }

    /// Replace the slot holding credentials of `kind`
    pub fn set_token(&mut self, kind: CredentialKind, value: Option<CachedSecret>) {
        let slot = match kind {
            CredentialKind::IdToken => &mut self.id_token,
            CredentialKind::MfaToken => &mut self.mfa_token,
            CredentialKind::OAuthAccessToken => &mut self.oauth_access_token,
            CredentialKind::OAuthRefreshToken => &mut self.oauth_refresh_token,
        };
        *slot = value;
    }
}
