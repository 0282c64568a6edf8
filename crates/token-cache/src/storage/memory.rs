//! In-process storage backend
//!
//! Holds secrets in memory only. Useful as a stand-in backend for tests and
//! for embedders that want caching for the lifetime of one process.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::SecureStorage;
use crate::error::Result;

type EntryKey = (String, String, String);

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<EntryKey, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of secrets currently held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn entry_key(host: &str, user: &str, key: &str) -> EntryKey {
    (host.to_string(), user.to_string(), key.to_string())
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn get(&self, host: &str, user: &str, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(&entry_key(host, user, key)).cloned())
    }

    async fn set(&self, host: &str, user: &str, key: &str, secret: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry_key(host, user, key), secret.to_string());
        Ok(())
    }

    async fn delete(&self, host: &str, user: &str, key: &str) -> Result<()> {
        self.entries.write().await.remove(&entry_key(host, user, key));
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "In-Memory Storage"
    }
}
