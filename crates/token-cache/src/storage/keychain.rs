//! OS Keychain storage backend
//!
//! Uses the system credential vault through the `keyring` crate:
//! - macOS: Keychain
//! - Windows: Credential Manager
//!
//! The two vaults name entries differently. The macOS keychain keys generic
//! passwords by (service, account), so the host becomes the service and the
//! rest of the triple goes into the account. Windows Credential Manager is
//! keyed by a single target name, so the whole triple is folded into it.

use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use super::SecureStorage;
use crate::error::{CacheError, Result};

/// Which OS vault the entries are shaped for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeychainFlavor {
    /// macOS Keychain generic passwords
    MacKeychain,
    /// Windows Credential Manager generic credentials
    WindowsCredentialManager,
}

/// OS Keychain storage backend
pub struct KeychainStorage {
    flavor: KeychainFlavor,
    /// Namespace folded into every entry name
    service_prefix: String,
}

impl KeychainStorage {
    /// Open the keychain, checking that the native bridge answers.
    ///
    /// The check is a read-only lookup: a missing entry proves the vault is
    /// reachable, while a platform failure means the bridge is not usable.
    pub fn open(flavor: KeychainFlavor, service_prefix: &str) -> Result<Self> {
        let storage = Self {
            flavor,
            service_prefix: service_prefix.to_string(),
        };

        let (service, account) =
            storage.entry_names("__availability__", "__availability__", "__availability__");
        let entry = Entry::new(&service, &account)
            .map_err(|e| CacheError::BackendUnavailable(e.to_string()))?;

        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => {
                debug!("{} is available", storage.backend_name());
                Ok(storage)
            }
            Err(e) => Err(CacheError::BackendUnavailable(e.to_string())),
        }
    }

    /// Compute the (service, account) pair for a cache triple
    fn entry_names(&self, host: &str, user: &str, key: &str) -> (String, String) {
        match self.flavor {
            KeychainFlavor::MacKeychain => (
                host.to_string(),
                format!("{}:{}:{}", self.service_prefix, user, key),
            ),
            KeychainFlavor::WindowsCredentialManager => (
                format!("{}:{}:{}:{}", host, user, self.service_prefix, key),
                user.to_string(),
            ),
        }
    }

    fn get_entry(&self, host: &str, user: &str, key: &str) -> Result<Entry> {
        let (service, account) = self.entry_names(host, user, key);
        Entry::new(&service, &account).map_err(|e| CacheError::BackendOperation(e.to_string()))
    }

    /// The vault flavour this storage writes
    pub fn flavor(&self) -> KeychainFlavor {
        self.flavor
    }
}

#[async_trait]
impl SecureStorage for KeychainStorage {
    async fn get(&self, host: &str, user: &str, key: &str) -> Result<Option<String>> {
        let entry = self.get_entry(host, user, key)?;

        match entry.get_password() {
            Ok(secret) => {
                debug!("Retrieved {} from keychain for {}@{}", key, user, host);
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No {} in keychain for {}@{}", key, user, host);
                Ok(None)
            }
            Err(e) => Err(CacheError::BackendOperation(e.to_string())),
        }
    }

    async fn set(&self, host: &str, user: &str, key: &str, secret: &str) -> Result<()> {
        let entry = self.get_entry(host, user, key)?;

        entry
            .set_password(secret)
            .map_err(|e| CacheError::BackendOperation(e.to_string()))?;

        debug!("Stored {} in keychain for {}@{}", key, user, host);
        Ok(())
    }

    async fn delete(&self, host: &str, user: &str, key: &str) -> Result<()> {
        let entry = self.get_entry(host, user, key)?;

        match entry.delete_password() {
            Ok(()) => {
                debug!("Deleted {} from keychain for {}@{}", key, user, host);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CacheError::BackendOperation(e.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        match self.flavor {
            KeychainFlavor::MacKeychain => "macOS Keychain",
            KeychainFlavor::WindowsCredentialManager => "Windows Credential Manager",
        }
    }
}
