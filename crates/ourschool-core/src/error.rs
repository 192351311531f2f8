use thiserror::Error;

/// Errors surfaced to direct callers of the session operations.
///
/// Everything that goes wrong inside the background tasks (expiry, removal,
/// failed renewal) ends the session instead of producing one of these.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid token format")]
    InvalidTokenFormat,

    #[error("Failed to persist session: {0:#}")]
    Storage(anyhow::Error),
}
