//! Error types for token-cache

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Cache error types
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed caller configuration (server URL, OAuth token endpoint)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No secure storage backend could be initialized
    #[error("Secure storage unavailable: {0}")]
    BackendUnavailable(String),

    /// A single get/set/delete call against the backend failed
    #[error("Secure storage operation failed: {0}")]
    BackendOperation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CacheError {
    /// Whether this error reflects caller misconfiguration rather than
    /// environment degradation
    pub fn is_configuration(&self) -> bool {
        matches!(self, CacheError::InvalidConfiguration(_))
    }
}
