//! Credential type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Kind of cached credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Identity token from browser-based SSO
    IdToken,
    /// Token allowing MFA prompts to be skipped
    MfaToken,
    /// OAuth access token issued by the identity provider
    #[serde(rename = "oauth_access_token")]
    OAuthAccessToken,
    /// OAuth refresh token issued by the identity provider
    #[serde(rename = "oauth_refresh_token")]
    OAuthRefreshToken,
}

impl CredentialKind {
    /// All kinds, in a stable order
    pub const ALL: [CredentialKind; 4] = [
        CredentialKind::IdToken,
        CredentialKind::MfaToken,
        CredentialKind::OAuthAccessToken,
        CredentialKind::OAuthRefreshToken,
    ];

    /// Stable string used as the key component in the backend.
    /// These values are persisted and must never change.
    pub fn discriminator(&self) -> &'static str {
        match self {
            CredentialKind::IdToken => "ID_TOKEN",
            CredentialKind::MfaToken => "MFATOKEN",
            CredentialKind::OAuthAccessToken => "OAUTH_ACCESS_TOKEN",
            CredentialKind::OAuthRefreshToken => "OAUTH_REFRESH_TOKEN",
        }
    }

    /// Whether this token is scoped to the identity provider
    pub fn is_oauth(&self) -> bool {
        matches!(
            self,
            CredentialKind::OAuthAccessToken | CredentialKind::OAuthRefreshToken
        )
    }

    /// snake_case name, as used in settings and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            CredentialKind::IdToken => "id_token",
            CredentialKind::MfaToken => "mfa_token",
            CredentialKind::OAuthAccessToken => "oauth_access_token",
            CredentialKind::OAuthRefreshToken => "oauth_refresh_token",
        }
    }

    /// Human-readable label for log messages
    pub fn label(&self) -> &'static str {
        match self {
            CredentialKind::IdToken => "id token",
            CredentialKind::MfaToken => "mfa token",
            CredentialKind::OAuthAccessToken => "OAuth access token",
            CredentialKind::OAuthRefreshToken => "OAuth refresh token",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses the snake_case name (`id_token`, `oauth_access_token`, ...) or
/// the discriminator (`ID_TOKEN`, `MFATOKEN`, ...)
impl FromStr for CredentialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CredentialKind::ALL
            .into_iter()
            .find(|kind| s == kind.name() || s == kind.discriminator())
            .ok_or_else(|| format!("Unknown credential kind: {}", s))
    }
}

/// Characters of a secret shown by [`CachedSecret::redacted_prefix`]
const DISPLAY_PREFIX_CHARS: usize = 8;

/// Cached secret value - automatically zeroed when dropped
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CachedSecret {
    value: String,
}

impl CachedSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the secret value (use carefully)
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Consume and return the inner value
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.value)
    }

    /// First characters followed by an ellipsis, for display
    ///
    /// The prefix is shown only when it is at most a quarter of the secret;
    /// shorter secrets display as `[REDACTED]`.
    pub fn redacted_prefix(&self) -> String {
        if self.value.chars().count() < DISPLAY_PREFIX_CHARS * 4 {
            return "[REDACTED]".to_string();
        }
        let prefix: String = self.value.chars().take(DISPLAY_PREFIX_CHARS).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for CachedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedSecret")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
