//! Storage backends for cached credentials
//!
//! This module provides:
//! 1. OS Keychain (macOS Keychain, Windows Credential Manager)
//! 2. File-backed credential cache (Linux)
//! 3. In-memory storage (tests, embedding)
//!
//! and the startup logic choosing one of them for the current platform.

mod traits;
mod keychain;
mod file_cache;
mod memory;
mod platform;

pub use traits::SecureStorage;
pub use keychain::{KeychainFlavor, KeychainStorage};
pub use file_cache::{FileCredentialStorage, CACHE_DIR_ENV};
pub use memory::MemoryStorage;
pub use platform::{select_backend, BackendSelection, Platform, UnavailableReason};
