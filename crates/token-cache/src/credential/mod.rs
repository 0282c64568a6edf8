//! Credential caching for the login flow

mod cache;
mod key_policy;
mod login;
mod types;

pub use cache::CredentialCache;
pub use key_policy::derive_host;
pub use login::LoginContext;
pub use types::*;
