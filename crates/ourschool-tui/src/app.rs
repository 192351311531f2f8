//! Interactive session watcher state.

use tokio::sync::{broadcast, watch};
use tracing::debug;

use ourschool_core::session::ActivityListeners;
use ourschool_core::{
    ActivitySignal, ExtendOutcome, LogoutReason, SessionController, SessionEvent, SessionSnapshot,
};

/// Capacity of the interaction channel. Signals arrive in bursts while the
/// mouse moves; lagging only drops duplicates.
const ACTIVITY_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Watching,
    ShowingHelp,
    Quitting,
}

pub struct App {
    controller: SessionController,
    pub snapshot: SessionSnapshot,
    pub state: AppState,
    pub status_message: Option<String>,
    /// Set once the session ends; the shell exits and prints it
    pub ended: Option<LogoutReason>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Receiver<SessionEvent>,
    signals: broadcast::Sender<ActivitySignal>,
    listeners: Option<ActivityListeners>,
}

impl App {
    pub fn new(controller: SessionController) -> Self {
        let (signals, _) = broadcast::channel(ACTIVITY_BUFFER_SIZE);
        let listeners = controller.activity().listen(&signals);
        let mut snapshots = controller.subscribe();
        let snapshot = snapshots.borrow_and_update().clone();
        let events = controller.events();

        Self {
            controller,
            snapshot,
            state: AppState::Watching,
            status_message: None,
            ended: None,
            snapshots,
            events,
            signals,
            listeners: Some(listeners),
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Forward a user interaction to the activity tracker
    pub fn record(&self, signal: ActivitySignal) {
        // No listeners only happens after shutdown
        let _ = self.signals.send(signal);
    }

    /// Pull the latest snapshot and any pending session events
    pub fn sync(&mut self) {
        if self.snapshots.has_changed().unwrap_or(false) {
            self.snapshot = self.snapshots.borrow_and_update().clone();
        }

        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Session events lagged");
                }
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::LoggedIn { username } => {
                self.status_message = Some(format!("Signed in as {}", username));
            }
            SessionEvent::ExpiryWarning { .. } => {
                self.status_message = Some("Session expiring soon".to_string());
            }
            SessionEvent::Renewed => {
                self.status_message = Some("Session renewed".to_string());
            }
            SessionEvent::LoggedOut { reason } => {
                self.ended = Some(reason);
                self.state = AppState::Quitting;
            }
        }
    }

    pub async fn extend(&mut self) {
        self.status_message = Some("Extending session...".to_string());
        match self.controller.extend_session().await {
            ExtendOutcome::Renewed => {
                self.status_message = Some("Session extended".to_string());
            }
            ExtendOutcome::Superseded => {
                self.status_message = Some("Session changed, nothing extended".to_string());
            }
            // The LoggedOut event ends the shell
            ExtendOutcome::SessionEnded => {}
        }
        self.sync();
    }

    pub fn dismiss_warning(&mut self) {
        self.controller.dismiss_warning();
        self.status_message = None;
        self.sync();
    }

    pub fn refresh(&mut self) {
        self.controller.refresh_monitoring();
        self.status_message = Some("Refreshed from storage".to_string());
        self.sync();
    }

    pub fn toggle_help(&mut self) {
        self.state = match self.state {
            AppState::ShowingHelp => AppState::Watching,
            _ => AppState::ShowingHelp,
        };
    }

    pub fn quit(&mut self) {
        self.state = AppState::Quitting;
    }

    pub fn should_quit(&self) -> bool {
        self.state == AppState::Quitting
    }

    /// Stop listening and stop the session tasks. The stored session is kept
    /// unless it already ended. Returns a message for the terminal.
    pub fn shutdown(&mut self) -> Option<String> {
        if let Some(listeners) = self.listeners.take() {
            listeners.stop();
        }
        self.controller.shutdown();
        self.ended
            .map(|reason| format!("Session ended: {}. Run `ourschool login` to sign in again.", reason))
    }
}
