//! Storage trait definitions

use crate::error::Result;
use async_trait::async_trait;

/// Trait for secure storage backends
///
/// Entries are addressed by `(host, user, key)` where `key` is the
/// credential kind discriminator. Implementations must treat all three
/// components as case-sensitive.
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Retrieve the secret stored for the triple, if any
    async fn get(&self, host: &str, user: &str, key: &str) -> Result<Option<String>>;

    /// Store a secret, overwriting any previous value for the triple
    async fn set(&self, host: &str, user: &str, key: &str, secret: &str) -> Result<()>;

    /// Delete the secret for the triple. Deleting a missing entry succeeds.
    async fn delete(&self, host: &str, user: &str, key: &str) -> Result<()>;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
