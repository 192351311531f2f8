//! Session lifecycle management.
//!
//! The `SessionController` keeps the persisted token under watch:
//! - `SessionMonitor` re-validates it every tick and raises the expiry warning
//! - `RenewalPolicy` silently renews it while the user is active
//! - `ActivityTracker` records when the user last interacted
//!
//! Consumers read the derived `SessionSnapshot` and listen for
//! `SessionEvent`s; they own no session logic themselves.

pub mod activity;
pub mod controller;
pub mod monitor;
pub mod renewal;
pub mod state;
mod task;

pub use activity::{ActivityListeners, ActivitySignal, ActivityTracker};
pub use controller::SessionController;
pub use monitor::{SessionMonitor, Verdict, WarningLatch};
pub use renewal::{RenewalPolicy, RenewalTask, TokenRenewer};
pub use state::{ExtendOutcome, LogoutReason, SessionEvent, SessionSnapshot};
