use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::utils::format_remaining;

/// Derived session state published to UI consumers.
///
/// Recomputed on every monitor tick and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_valid: bool,
    pub time_remaining_secs: i64,
    pub show_warning: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.is_valid && self.user.is_some()
    }

    pub fn time_remaining(&self) -> Duration {
        Duration::seconds(self.time_remaining_secs)
    }

    /// Time remaining for display, e.g. "14m 05s"
    pub fn time_remaining_display(&self) -> String {
        format_remaining(self.time_remaining())
    }
}

/// Why a session ended. Diagnostic only; never shown to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// Explicit sign-out
    #[default]
    UserRequested,
    /// The token's expiration passed
    TokenExpired,
    /// The persisted token vanished or was replaced underneath the monitor
    ExternalRemoval,
    /// Automatic renewal was rejected or could not be serviced
    RenewalFailed,
    /// A user-requested extension was rejected or could not be serviced
    ExtensionFailed,
    /// Persisted credentials were unusable
    InvalidStoredSession,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LogoutReason::UserRequested => "User requested",
            LogoutReason::TokenExpired => "Token expired",
            LogoutReason::ExternalRemoval => "Token removed or replaced externally",
            LogoutReason::RenewalFailed => "Automatic renewal failed",
            LogoutReason::ExtensionFailed => "Session extension failed",
            LogoutReason::InvalidStoredSession => "Stored session invalid",
        };
        f.write_str(text)
    }
}

/// Discrete session notifications for UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    /// The session is close to expiry. Raised once per validity window.
    ExpiryWarning { time_remaining: Duration },
    Renewed,
    LoggedOut { reason: LogoutReason },
}

/// Result of `SessionController::extend_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    /// The session continues on a fresh token
    Renewed,
    /// The renewal failed and the session was ended
    SessionEnded,
    /// The session changed while the renewal was in flight; the fresh token
    /// was discarded and the current session left as it is
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_unauthenticated() {
        let snapshot = SessionSnapshot::default();
        assert!(!snapshot.is_authenticated());
        assert!(!snapshot.show_warning);
        assert_eq!(snapshot.time_remaining(), Duration::zero());
    }

    #[test]
    fn test_logout_reason_display() {
        assert_eq!(LogoutReason::TokenExpired.to_string(), "Token expired");
        assert_eq!(
            LogoutReason::ExtensionFailed.to_string(),
            "Session extension failed"
        );
        assert_eq!(LogoutReason::default(), LogoutReason::UserRequested);
    }
}
