//! Cache settings
//!
//! Stored as a plain JSON file. Nothing here is secret: the settings only
//! decide whether caching is enabled and where backends keep their data.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Default namespace for keychain entries
pub const DEFAULT_SERVICE_PREFIX: &str = "token-cache";

/// Credential cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Whether credentials are cached at all
    pub enabled: bool,
    /// Namespace folded into keychain entry names
    pub service_prefix: String,
    /// Directory for the file-backed cache (Linux). Falls back to the
    /// `TOKEN_CACHE_DIR` environment variable, then the platform cache dir.
    pub file_cache_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            service_prefix: DEFAULT_SERVICE_PREFIX.to_string(),
            file_cache_dir: None,
        }
    }
}

impl CacheSettings {
    /// Load settings from a JSON file, using defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: CacheSettings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, path).await?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = CacheSettings::load(&temp_dir.path().join("settings.json")).unwrap();

        assert!(settings.enabled);
        assert_eq!(settings.service_prefix, "token-cache");
        assert_eq!(settings.file_cache_dir, None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "enabled": false }"#).unwrap();

        let settings = CacheSettings::load(&path).unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.service_prefix, "token-cache");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "enabled = true").unwrap();

        assert!(CacheSettings::load(&path).is_err());
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let settings = CacheSettings {
            enabled: true,
            service_prefix: "my-driver".to_string(),
            file_cache_dir: Some(temp_dir.path().join("cache")),
        };
        settings.save(&path).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("servicePrefix"));
        assert_eq!(CacheSettings::load(&path).unwrap(), settings);
    }
}
