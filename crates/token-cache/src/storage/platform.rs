//! Backend selection at startup
//!
//! The backend is chosen once from the detected platform. Initialization of
//! the platform backend may fail (the native bridge is not usable); that is
//! reported as an ordinary [`BackendSelection::Unavailable`] value.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{FileCredentialStorage, KeychainFlavor, KeychainStorage, SecureStorage};
use crate::error::Result;
use crate::settings::CacheSettings;

/// Host platform tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    /// Anything else, carrying the OS name
    Other(String),
}

impl Platform {
    /// Detect the platform this process runs on
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            other => Platform::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::MacOs => write!(f, "macOS"),
            Platform::Windows => write!(f, "Windows"),
            Platform::Linux => write!(f, "Linux"),
            Platform::Other(os) => write!(f, "{}", os),
        }
    }
}

/// Why no backend is available
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Caching switched off in the settings
    Disabled,
    /// No backend exists for this platform
    UnsupportedPlatform(String),
    /// The platform backend exists but could not be initialized
    BridgeMissing(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::Disabled => write!(f, "credential caching is disabled"),
            UnavailableReason::UnsupportedPlatform(os) => write!(
                f,
                "unsupported platform '{}' (expected macOS, Windows or Linux)",
                os
            ),
            UnavailableReason::BridgeMissing(detail) => {
                write!(f, "native secure storage bridge is not usable: {}", detail)
            }
        }
    }
}

/// Outcome of backend selection
pub enum BackendSelection {
    Ready(Arc<dyn SecureStorage>),
    Unavailable(UnavailableReason),
}

/// Select the backend for a platform
pub fn select_backend(platform: &Platform, settings: &CacheSettings) -> BackendSelection {
    if !settings.enabled {
        info!("Credential caching disabled by settings");
        return BackendSelection::Unavailable(UnavailableReason::Disabled);
    }

    let opened: Result<Arc<dyn SecureStorage>> = match platform {
        Platform::MacOs => KeychainStorage::open(KeychainFlavor::MacKeychain, &settings.service_prefix)
            .map(|s| Arc::new(s) as Arc<dyn SecureStorage>),
        Platform::Windows => KeychainStorage::open(
            KeychainFlavor::WindowsCredentialManager,
            &settings.service_prefix,
        )
        .map(|s| Arc::new(s) as Arc<dyn SecureStorage>),
        Platform::Linux => file_cache_dir(settings)
            .and_then(FileCredentialStorage::open)
            .map(|s| Arc::new(s) as Arc<dyn SecureStorage>),
        Platform::Other(os) => {
            error!("Unsupported operating system '{}'. Expected macOS, Windows or Linux", os);
            return BackendSelection::Unavailable(UnavailableReason::UnsupportedPlatform(
                os.clone(),
            ));
        }
    };

    match opened {
        Ok(backend) => {
            info!("Using {} for credential caching on {}", backend.backend_name(), platform);
            BackendSelection::Ready(backend)
        }
        Err(e) => {
            warn!(
                "Secure storage for {} could not be initialized, continuing without credential caching: {}",
                platform, e
            );
            BackendSelection::Unavailable(UnavailableReason::BridgeMissing(e.to_string()))
        }
    }
}

fn file_cache_dir(settings: &CacheSettings) -> Result<PathBuf> {
    match &settings.file_cache_dir {
        Some(dir) => Ok(dir.clone()),
        None => FileCredentialStorage::default_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_platform_from_os() {
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
        assert_eq!(Platform::from_os("windows"), Platform::Windows);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(
            Platform::from_os("freebsd"),
            Platform::Other("freebsd".to_string())
        );
    }

    #[test]
    fn test_unsupported_platform() {
        let selection = select_backend(
            &Platform::Other("freebsd".to_string()),
            &CacheSettings::default(),
        );
        match selection {
            BackendSelection::Unavailable(reason) => {
                assert_eq!(reason, UnavailableReason::UnsupportedPlatform("freebsd".to_string()));
                assert!(reason.to_string().contains("unsupported platform"));
            }
            BackendSelection::Ready(_) => panic!("expected unavailable backend"),
        }
    }

    #[test]
    fn test_disabled_by_settings() {
        let settings = CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        };
        let selection = select_backend(&Platform::Linux, &settings);
        assert!(matches!(
            selection,
            BackendSelection::Unavailable(UnavailableReason::Disabled)
        ));
    }

    #[test]
    fn test_linux_uses_file_cache() {
        let temp_dir = TempDir::new().unwrap();
        let settings = CacheSettings {
            file_cache_dir: Some(temp_dir.path().join("creds")),
            ..CacheSettings::default()
        };

        match select_backend(&Platform::Linux, &settings) {
            BackendSelection::Ready(backend) => {
                assert_eq!(backend.backend_name(), "File Credential Cache")
            }
            BackendSelection::Unavailable(reason) => panic!("unexpected: {}", reason),
        }
    }

    #[test]
    fn test_linux_init_failure_is_bridge_missing() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let settings = CacheSettings {
            file_cache_dir: Some(blocker.join("creds")),
            ..CacheSettings::default()
        };

        match select_backend(&Platform::Linux, &settings) {
            BackendSelection::Unavailable(UnavailableReason::BridgeMissing(detail)) => {
                assert!(!detail.is_empty())
            }
            BackendSelection::Unavailable(reason) => panic!("wrong reason: {}", reason),
            BackendSelection::Ready(_) => panic!("expected unavailable backend"),
        }
    }
}
