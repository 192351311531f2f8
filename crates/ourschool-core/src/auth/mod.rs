//! Authentication module for tokens, the cached user record and credentials.
//!
//! This module provides:
//! - `token`: pure structural and expiry checks on bearer tokens
//! - `User`: the cached profile of the signed-in user
//! - `CredentialStore`: the key-value seam the session persists through,
//!   with in-memory, file and OS keychain backends

pub mod credentials;
pub mod store;
pub mod token;
pub mod user;

pub use credentials::KeyringStore;
pub use store::{CredentialStore, FileStore, MemoryStore, TOKEN_KEY, USER_KEY};
pub use user::{User, UserRole};
