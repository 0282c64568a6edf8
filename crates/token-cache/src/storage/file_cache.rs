//! File-backed credential cache
//!
//! Used on Linux, where no single OS credential vault can be assumed.
//! All entries live in one JSON document in the user's cache directory,
//! readable by the owner only. Entry keys are SHA-256 digests of the
//! `(host, user, kind)` triple so the file does not reveal which accounts
//! have cached credentials.
//!
//! The document is shared by every process of the user, so each operation
//! reads it from disk. Writers hold an exclusive lock on a sibling lock
//! file while they read, modify and replace the document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::SecureStorage;
use crate::error::{CacheError, Result};

/// Name of the cache document inside the cache directory
const CACHE_FILE_NAME: &str = "credential_cache_v1.json";

/// Name of the lock file guarding writes to the document
const LOCK_FILE_NAME: &str = "credential_cache_v1.lock";

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "TOKEN_CACHE_DIR";

/// File-backed credential storage
pub struct FileCredentialStorage {
    /// Directory holding the cache document
    cache_dir: PathBuf,
    /// Orders writers within this process; the file lock orders processes
    write_lock: Mutex<()>,
}

/// A single cached secret
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedToken {
    secret: String,
    updated_at: DateTime<Utc>,
}

/// File format for persistent storage
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    tokens: HashMap<String, CachedToken>,
}

/// Exclusive lock on the cache directory, released on drop
struct DocumentLock {
    file: File,
}

impl DocumentLock {
    fn acquire(cache_dir: &Path) -> Result<Self> {
        let path = cache_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        restrict_permissions(&path, 0o600)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!("Failed to release credential cache lock: {}", e);
        }
    }
}

impl FileCredentialStorage {
    /// Open (creating if needed) the cache in the given directory
    ///
    /// Only a directory created here is restricted to the owner; an existing
    /// directory keeps its permissions and the document itself is 0600.
    pub fn open(cache_dir: PathBuf) -> Result<Self> {
        if !cache_dir.is_dir() {
            std::fs::create_dir_all(&cache_dir)?;
            restrict_permissions(&cache_dir, 0o700)?;
        }

        let entries = Self::load_from_file(&cache_dir.join(CACHE_FILE_NAME))?.len();
        debug!(
            "File credential cache initialized at {:?} with {} entries",
            cache_dir, entries
        );

        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Resolve the default cache directory: the `TOKEN_CACHE_DIR`
    /// environment variable, then the platform cache directory
    pub fn default_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        ProjectDirs::from("com", "token-cache", "token-cache")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .ok_or_else(|| {
                CacheError::BackendUnavailable("Could not determine cache directory".to_string())
            })
    }

    /// Path of the cache document
    pub fn cache_file_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE_NAME)
    }

    fn load_from_file(path: &Path) -> Result<HashMap<String, CachedToken>> {
        if !path.exists() {
            debug!("No existing credential cache file");
            return Ok(HashMap::new());
        }

        let contents = std::fs::read_to_string(path)?;
        match serde_json::from_str::<CacheFile>(&contents) {
            Ok(file) if file.version == FORMAT_VERSION => Ok(file.tokens),
            Ok(file) => {
                warn!(
                    "Ignoring credential cache with unknown version {}",
                    file.version
                );
                Ok(HashMap::new())
            }
            Err(e) => {
                // The next write replaces the unreadable document.
                warn!("Ignoring unreadable credential cache {:?}: {}", path, e);
                Ok(HashMap::new())
            }
        }
    }

    /// Persist the document atomically through a temp file
    fn save(&self, tokens: HashMap<String, CachedToken>) -> Result<()> {
        let count = tokens.len();
        let file = CacheFile {
            version: FORMAT_VERSION,
            tokens,
        };

        let contents = serde_json::to_string_pretty(&file)?;
        let path = self.cache_file_path();

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &contents)?;
        restrict_permissions(&temp_path, 0o600)?;
        std::fs::rename(&temp_path, &path)?;

        debug!("Saved {} entries to credential cache", count);
        Ok(())
    }

    /// Re-read the document under the directory lock, apply `change` and
    /// write the result back if `change` reports a modification
    ///
    /// Nothing is kept in memory between calls, so a failed write leaves no
    /// trace in this process either.
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, CachedToken>) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let _lock = DocumentLock::acquire(&self.cache_dir)?;

        let mut tokens = Self::load_from_file(&self.cache_file_path())?;
        if change(&mut tokens) {
            self.save(tokens)?;
        }
        Ok(())
    }
}

/// Digest of the cache triple used as the document key
fn token_key(host: &str, user: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [host, user, key] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[async_trait]
impl SecureStorage for FileCredentialStorage {
    async fn get(&self, host: &str, user: &str, key: &str) -> Result<Option<String>> {
        // Writers replace the document by rename, so a plain read is consistent.
        let mut tokens = Self::load_from_file(&self.cache_file_path())?;
        Ok(tokens
            .remove(&token_key(host, user, key))
            .map(|token| token.secret))
    }

    async fn set(&self, host: &str, user: &str, key: &str, secret: &str) -> Result<()> {
        let entry_key = token_key(host, user, key);
        self.update(|tokens| {
            tokens.insert(
                entry_key,
                CachedToken {
                    secret: secret.to_string(),
                    updated_at: Utc::now(),
                },
            );
            true
        })
        .await
    }

    async fn delete(&self, host: &str, user: &str, key: &str) -> Result<()> {
        let entry_key = token_key(host, user, key);
        self.update(|tokens| tokens.remove(&entry_key).is_some()).await
    }

    fn backend_name(&self) -> &'static str {
        "File Credential Cache"
    }
}
