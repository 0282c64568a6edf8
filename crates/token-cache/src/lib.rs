//! # token-cache
//!
//! Credential caching layer for login flows:
//! - Caches id tokens, MFA tokens and OAuth access/refresh tokens
//! - OS keychain backends (macOS Keychain, Windows Credential Manager)
//!   and an owner-only file cache on Linux
//! - OAuth entries keyed by the identity provider host
//! - Fails open: a missing or broken backend never aborts a login
//!
//! Create one [`CredentialCache`] at startup and share it:
//!
//! ```no_run
//! use std::sync::Arc;
//! use token_cache::{CredentialCache, CredentialKind, LoginContext};
//!
//! # async fn login() -> token_cache::Result<()> {
//! let cache = Arc::new(CredentialCache::detect());
//!
//! let mut login = LoginContext::new("https://acct.example.com", "alice");
//! cache.fill_login(CredentialKind::IdToken, &mut login).await?;
//! if login.id_token.is_none() {
//!     // full authentication, then:
//!     cache.write_login(CredentialKind::IdToken, &login).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod credential;
pub mod error;
pub mod settings;
pub mod storage;

pub use credential::{derive_host, CachedSecret, CredentialCache, CredentialKind, LoginContext};
pub use error::{CacheError, Result};
pub use settings::CacheSettings;
pub use storage::{
    select_backend, BackendSelection, FileCredentialStorage, KeychainFlavor, KeychainStorage,
    MemoryStorage, Platform, SecureStorage, UnavailableReason,
};
