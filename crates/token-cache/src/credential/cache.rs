//! Credential cache
//!
//! Fronts the selected [`SecureStorage`] backend for the login flow. Every
//! operation holds one lock for its whole duration, so concurrent login
//! attempts observe a linear history of the cache.
//!
//! The cache fails open: when no backend is available, or a backend call
//! fails, the operation logs and behaves as if nothing was cached. The only
//! error surfaced to callers is
//! [`CacheError::InvalidConfiguration`](crate::error::CacheError::InvalidConfiguration).
//! [`CredentialCache::inspect`] is the exception, for tools that must report
//! whether a change actually reached the backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::key_policy::derive_host;
use super::{CachedSecret, CredentialKind, LoginContext};
use crate::error::{CacheError, Result};
use crate::settings::CacheSettings;
use crate::storage::{select_backend, BackendSelection, Platform, SecureStorage, UnavailableReason};

/// Process-wide credential cache
pub struct CredentialCache {
    /// Backend, fixed at construction
    backend: Option<Arc<dyn SecureStorage>>,
    /// Why `backend` is absent
    unavailable: Option<UnavailableReason>,
    /// Serializes fill/write/delete
    op_lock: Mutex<()>,
    /// Whether the degraded-mode warning has been logged
    warned_unavailable: AtomicBool,
}

impl CredentialCache {
    /// Create a cache for the current platform with default settings
    pub fn detect() -> Self {
        Self::from_settings(&CacheSettings::default())
    }

    /// Create a cache for the current platform
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::for_platform(&Platform::detect(), settings)
    }

    /// Create a cache for an explicit platform
    pub fn for_platform(platform: &Platform, settings: &CacheSettings) -> Self {
        match select_backend(platform, settings) {
            BackendSelection::Ready(backend) => Self::with_backend(backend),
            BackendSelection::Unavailable(reason) => Self::unavailable(reason),
        }
    }

    /// Create a cache over a given backend (test doubles, embedding)
    pub fn with_backend(backend: Arc<dyn SecureStorage>) -> Self {
        Self {
            backend: Some(backend),
            unavailable: None,
            op_lock: Mutex::new(()),
            warned_unavailable: AtomicBool::new(false),
        }
    }

    /// Create a cache in degraded mode
    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self {
            backend: None,
            unavailable: Some(reason),
            op_lock: Mutex::new(()),
            warned_unavailable: AtomicBool::new(false),
        }
    }

    /// Whether a backend is present
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.backend_name())
    }

    /// Why the cache runs in degraded mode, if it does
    pub fn unavailable_reason(&self) -> Option<&UnavailableReason> {
        self.unavailable.as_ref()
    }

    /// Look up a cached credential.
    ///
    /// Returns `Ok(None)` when the username is empty, no backend is
    /// available, nothing is cached, or the backend call fails.
    pub async fn fill(
        &self,
        kind: CredentialKind,
        service_host: &str,
        username: &str,
        oauth_token_endpoint: Option<&str>,
    ) -> Result<Option<CachedSecret>> {
        let _guard = self.op_lock.lock().await;

        if username.is_empty() {
            debug!("Missing username; cannot read {} from credential cache", kind);
            return Ok(None);
        }
        let Some(backend) = self.backend.as_ref() else {
            self.warn_unavailable();
            return Ok(None);
        };

        let host = derive_host(kind, service_host, oauth_token_endpoint)?;
        debug!("Looking for cached {} for user: {}, host: {}", kind, username, host);

        match backend.get(&host, username, kind.discriminator()).await {
            Ok(Some(secret)) if !secret.is_empty() => {
                debug!("Found cached {} for user: {}, host: {}", kind, username, host);
                Ok(Some(CachedSecret::new(secret)))
            }
            Ok(_) => {
                debug!("No cached {} for user: {}, host: {}", kind, username, host);
                Ok(None)
            }
            Err(e) => {
                warn!(
                    "Failed to read {} from {}, continuing without it: {}",
                    kind,
                    backend.backend_name(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Cache a credential, overwriting any previous value.
    ///
    /// Empty usernames and empty secrets are ignored: an empty secret means
    /// there is nothing to cache, not that the entry should be removed.
    pub async fn write(&self, kind: CredentialKind, host: &str, username: &str, secret: &str) {
        let _guard = self.op_lock.lock().await;

        if username.is_empty() {
            debug!("Missing username; cannot write {} to credential cache", kind);
            return;
        }
        if secret.is_empty() {
            debug!("No {} given; nothing to cache", kind);
            return;
        }
        let Some(backend) = self.backend.as_ref() else {
            self.warn_unavailable();
            return;
        };

        debug!("Caching {} for user: {}, host: {}", kind, username, host);
        if let Err(e) = backend.set(host, username, kind.discriminator(), secret).await {
            warn!("Failed to cache {} in {}: {}", kind, backend.backend_name(), e);
        }
    }

    /// Remove a cached credential. Removing a missing entry is not an error.
    pub async fn delete(&self, kind: CredentialKind, host: &str, username: &str) {
        let _guard = self.op_lock.lock().await;

        let Some(backend) = self.backend.as_ref() else {
            self.warn_unavailable();
            return;
        };
        if username.is_empty() {
            debug!("Missing username; cannot delete {} from credential cache", kind);
            return;
        }

        debug!("Removing cached {} for user: {}, host: {}", kind, username, host);
        if let Err(e) = backend.delete(host, username, kind.discriminator()).await {
            warn!("Failed to remove {} from {}: {}", kind, backend.backend_name(), e);
        }
    }

    /// Read the entry stored under an already derived cache host, reporting
    /// backend failures and degraded mode as errors instead of absorbing them
    pub async fn inspect(
        &self,
        kind: CredentialKind,
        host: &str,
        username: &str,
    ) -> Result<Option<CachedSecret>> {
        let _guard = self.op_lock.lock().await;

        let Some(backend) = self.backend.as_ref() else {
            let reason = self
                .unavailable
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "no backend".to_string());
            return Err(CacheError::BackendUnavailable(reason));
        };
        if username.is_empty() {
            return Ok(None);
        }

        let secret = backend.get(host, username, kind.discriminator()).await?;
        Ok(secret.filter(|s| !s.is_empty()).map(CachedSecret::new))
    }

    /// Fill the login context slot for `kind` from the cache.
    ///
    /// The slot is overwritten with the lookup result, so a miss clears it.
    pub async fn fill_login(&self, kind: CredentialKind, login: &mut LoginContext) -> Result<()> {
        let service_host = login.service_host()?;
        let cached = self
            .fill(
                kind,
                &service_host,
                &login.username,
                login.oauth_token_request_url.as_deref(),
            )
            .await?;

        debug!(
            "Setting {}{} for user: {}",
            if cached.is_none() { "empty " } else { "" },
            kind,
            login.username
        );
        login.set_token(kind, cached);
        Ok(())
    }

    /// Cache the credential currently held in the login context slot for `kind`
    pub async fn write_login(&self, kind: CredentialKind, login: &LoginContext) -> Result<()> {
        let host = login.cache_host(kind)?;
        let secret = login.token(kind).map(|s| s.expose()).unwrap_or_default();
        self.write(kind, &host, &login.username, secret).await;
        Ok(())
    }

    /// Remove the cached credential of `kind` for the login context's account
    pub async fn delete_login(&self, kind: CredentialKind, login: &LoginContext) -> Result<()> {
        let host = login.cache_host(kind)?;
        self.delete(kind, &host, &login.username).await;
        Ok(())
    }

    fn warn_unavailable(&self) {
        let reason = self
            .unavailable
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "no backend".to_string());

        if !self.warned_unavailable.swap(true, Ordering::Relaxed) {
            warn!(
                "Secure storage unavailable ({}); continuing without credential caching",
                reason
            );
        } else {
            debug!("Secure storage unavailable ({})", reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const HOST: &str = "acct.example.com";
    const IDP_ENDPOINT: &str = "https://idp.example.com/token";

    fn memory_cache() -> (CredentialCache, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (CredentialCache::with_backend(storage.clone()), storage)
    }

    async fn fill_id(cache: &CredentialCache) -> Option<String> {
        cache
            .fill(CredentialKind::IdToken, HOST, "alice", None)
            .await
            .unwrap()
            .map(CachedSecret::into_inner)
    }

    /// Backend whose calls fail while `failing` is set
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        failing: AtomicBool,
    }

    impl FlakyStorage {
        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(CacheError::BackendOperation("vault went away".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SecureStorage for FlakyStorage {
        async fn get(&self, host: &str, user: &str, key: &str) -> Result<Option<String>> {
            self.check()?;
            self.inner.get(host, user, key).await
        }

        async fn set(&self, host: &str, user: &str, key: &str, secret: &str) -> Result<()> {
            self.check()?;
            self.inner.set(host, user, key, secret).await
        }

        async fn delete(&self, host: &str, user: &str, key: &str) -> Result<()> {
            self.check()?;
            self.inner.delete(host, user, key).await
        }

        fn backend_name(&self) -> &'static str {
            "Flaky Storage"
        }
    }

    /// Backend recording how many calls overlap
    #[derive(Default)]
    struct OverlapStorage {
        inner: MemoryStorage,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl OverlapStorage {
        async fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        fn leave(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SecureStorage for OverlapStorage {
        async fn get(&self, host: &str, user: &str, key: &str) -> Result<Option<String>> {
            self.enter().await;
            let result = self.inner.get(host, user, key).await;
            self.leave();
            result
        }

        async fn set(&self, host: &str, user: &str, key: &str, secret: &str) -> Result<()> {
            self.enter().await;
            let result = self.inner.set(host, user, key, secret).await;
            self.leave();
            result
        }

        async fn delete(&self, host: &str, user: &str, key: &str) -> Result<()> {
            self.enter().await;
            let result = self.inner.delete(host, user, key).await;
            self.leave();
            result
        }

        fn backend_name(&self) -> &'static str {
            "Overlap Storage"
        }
    }

    #[tokio::test]
    async fn test_write_fill_delete_scenario() {
        let (cache, _) = memory_cache();

        cache.write(CredentialKind::IdToken, HOST, "alice", "tok1").await;
        assert_eq!(fill_id(&cache).await, Some("tok1".to_string()));

        cache.write(CredentialKind::IdToken, HOST, "alice", "tok2").await;
        assert_eq!(fill_id(&cache).await, Some("tok2".to_string()));

        cache.delete(CredentialKind::IdToken, HOST, "alice").await;
        assert_eq!(fill_id(&cache).await, None);
    }

    #[tokio::test]
    async fn test_round_trip_every_kind() {
        let (cache, storage) = memory_cache();

        for kind in CredentialKind::ALL {
            cache.write(kind, HOST, "alice", kind.discriminator()).await;
        }
        assert_eq!(storage.len().await, 4);

        for kind in CredentialKind::ALL {
            let secret = cache.fill(kind, HOST, "alice", None).await.unwrap().unwrap();
            assert_eq!(secret.expose(), kind.discriminator());
        }
    }

    #[tokio::test]
    async fn test_empty_secret_keeps_previous_value() {
        let (cache, _) = memory_cache();

        cache.write(CredentialKind::IdToken, HOST, "alice", "tok1").await;
        cache.write(CredentialKind::IdToken, HOST, "alice", "").await;

        assert_eq!(fill_id(&cache).await, Some("tok1".to_string()));
    }

    #[tokio::test]
    async fn test_empty_username_is_inert() {
        let (cache, storage) = memory_cache();
        storage.set(HOST, "", "ID_TOKEN", "planted").await.unwrap();

        cache.write(CredentialKind::IdToken, HOST, "", "tok").await;
        assert_eq!(
            cache.fill(CredentialKind::IdToken, HOST, "", None).await.unwrap(),
            None
        );
        cache.delete(CredentialKind::IdToken, HOST, "").await;

        assert_eq!(
            storage.get(HOST, "", "ID_TOKEN").await.unwrap(),
            Some("planted".to_string())
        );
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_users_and_hosts_are_case_sensitive() {
        let (cache, _) = memory_cache();

        cache.write(CredentialKind::MfaToken, HOST, "Alice", "upper").await;

        let lower = cache.fill(CredentialKind::MfaToken, HOST, "alice", None).await.unwrap();
        assert!(lower.is_none());
        let upper = cache.fill(CredentialKind::MfaToken, HOST, "Alice", None).await.unwrap();
        assert_eq!(upper.unwrap().expose(), "upper");
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_noop() {
        let cache = CredentialCache::unavailable(UnavailableReason::BridgeMissing(
            "no secret service".to_string(),
        ));
        assert!(!cache.is_available());
        assert_eq!(cache.backend_name(), None);

        cache.write(CredentialKind::IdToken, HOST, "alice", "tok").await;
        assert_eq!(fill_id(&cache).await, None);
        cache.delete(CredentialKind::IdToken, HOST, "alice").await;

        // Degraded mode does not even look at the endpoint.
        let filled = cache
            .fill(CredentialKind::OAuthAccessToken, HOST, "alice", Some("::bad"))
            .await
            .unwrap();
        assert!(filled.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_platform_degrades() {
        let cache = CredentialCache::for_platform(
            &Platform::Other("plan9".to_string()),
            &CacheSettings::default(),
        );
        assert_eq!(
            cache.unavailable_reason(),
            Some(&UnavailableReason::UnsupportedPlatform("plan9".to_string()))
        );
        assert_eq!(fill_id(&cache).await, None);
    }

    #[tokio::test]
    async fn test_oauth_entries_shared_across_deployments() {
        let (cache, storage) = memory_cache();

        let a = LoginContext::new("https://a.example.com", "alice")
            .with_oauth_token_request_url(IDP_ENDPOINT);
        let mut b = LoginContext::new("https://b.example.com", "alice")
            .with_oauth_token_request_url(IDP_ENDPOINT);

        let mut writer = a.clone();
        writer.oauth_refresh_token = Some(CachedSecret::new("refresh-1"));
        cache
            .write_login(CredentialKind::OAuthRefreshToken, &writer)
            .await
            .unwrap();

        assert_eq!(
            storage
                .get("idp.example.com", "alice", "OAUTH_REFRESH_TOKEN")
                .await
                .unwrap(),
            Some("refresh-1".to_string())
        );

        cache
            .fill_login(CredentialKind::OAuthRefreshToken, &mut b)
            .await
            .unwrap();
        assert_eq!(b.oauth_refresh_token.unwrap().expose(), "refresh-1");
    }

    #[tokio::test]
    async fn test_malformed_endpoint_propagates() {
        let (cache, _) = memory_cache();

        let err = cache
            .fill(CredentialKind::OAuthAccessToken, HOST, "alice", Some("::bad"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());

        let login = LoginContext::new("https://acct.example.com", "alice")
            .with_oauth_token_request_url("::bad");
        assert!(cache
            .delete_login(CredentialKind::OAuthAccessToken, &login)
            .await
            .is_err());
        // Id tokens are keyed by the service host and unaffected.
        assert!(cache
            .delete_login(CredentialKind::IdToken, &login)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_fill_login_miss_clears_slot() {
        let (cache, _) = memory_cache();

        let mut login = LoginContext::new("https://acct.example.com", "alice");
        login.mfa_token = Some(CachedSecret::new("stale"));

        cache.fill_login(CredentialKind::MfaToken, &mut login).await.unwrap();
        assert!(login.mfa_token.is_none());
    }

    #[tokio::test]
    async fn test_login_write_and_delete() {
        let (cache, storage) = memory_cache();

        let mut login = LoginContext::new("https://acct.example.com", "alice");
        cache.write_login(CredentialKind::IdToken, &login).await.unwrap();
        assert!(storage.is_empty().await);

        login.id_token = Some(CachedSecret::new("id-1"));
        cache.write_login(CredentialKind::IdToken, &login).await.unwrap();
        assert_eq!(fill_id(&cache).await, Some("id-1".to_string()));

        cache.delete_login(CredentialKind::IdToken, &login).await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_backend_failure_is_absorbed_per_call() {
        let storage = Arc::new(FlakyStorage::default());
        let cache = CredentialCache::with_backend(storage.clone());

        cache.write(CredentialKind::IdToken, HOST, "alice", "tok1").await;

        storage.failing.store(true, Ordering::SeqCst);
        assert_eq!(fill_id(&cache).await, None);
        cache.write(CredentialKind::IdToken, HOST, "alice", "tok2").await;
        cache.delete(CredentialKind::IdToken, HOST, "alice").await;

        storage.failing.store(false, Ordering::SeqCst);
        assert_eq!(fill_id(&cache).await, Some("tok1".to_string()));
    }

    #[tokio::test]
    async fn test_inspect_reports_backend_failures() {
        let storage = Arc::new(FlakyStorage::default());
        let cache = CredentialCache::with_backend(storage.clone());

        cache.write(CredentialKind::IdToken, HOST, "alice", "tok1").await;
        let found = cache.inspect(CredentialKind::IdToken, HOST, "alice").await.unwrap();
        assert_eq!(found.map(CachedSecret::into_inner), Some("tok1".to_string()));

        storage.failing.store(true, Ordering::SeqCst);
        cache.delete(CredentialKind::IdToken, HOST, "alice").await;
        assert!(matches!(
            cache.inspect(CredentialKind::IdToken, HOST, "alice").await,
            Err(CacheError::BackendOperation(_))
        ));

        storage.failing.store(false, Ordering::SeqCst);
        let found = cache.inspect(CredentialKind::IdToken, HOST, "alice").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_inspect_in_degraded_mode_is_an_error() {
        let cache = CredentialCache::unavailable(UnavailableReason::Disabled);
        let err = cache
            .inspect(CredentialKind::IdToken, HOST, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_stored_value_is_a_miss() {
        let (cache, storage) = memory_cache();
        storage.set(HOST, "alice", "ID_TOKEN", "").await.unwrap();

        assert_eq!(fill_id(&cache).await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_operations_never_overlap() {
        let storage = Arc::new(OverlapStorage::default());
        let cache = Arc::new(CredentialCache::with_backend(storage.clone()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let user = format!("user-{}", i);
                cache
                    .write(CredentialKind::IdToken, HOST, &user, &format!("tok-{}", i))
                    .await;
                cache.fill(CredentialKind::IdToken, HOST, &user, None).await.unwrap()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let secret = handle.await.unwrap().unwrap();
            assert_eq!(secret.expose(), format!("tok-{}", i));
        }

        assert_eq!(storage.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(storage.inner.len().await, 16);
    }
}
