//! Core library for OurSchool clients.
//!
//! This crate keeps a client's bearer token valid across a long-lived
//! session. It provides:
//! - `auth`: token validation, the cached user record and credential stores
//! - `session`: the activity tracker, session monitor, auto-renewal policy
//!   and the `SessionController` that orchestrates them
//! - `api`: the REST client used for silent renewal
//! - `config`: persisted client configuration

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, FileStore, KeyringStore, MemoryStore, User, UserRole};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{Config, SessionConfig, StoreBackend};
pub use error::SessionError;
pub use session::{
    ActivitySignal, ActivityTracker, ExtendOutcome, LogoutReason, SessionController,
    SessionEvent, SessionSnapshot, TokenRenewer,
};
