//! Session controller: the public face of the session lifecycle.
//!
//! The controller owns the credential store, the monitor and renewal task
//! handles, and the warning latch. Background tasks reach it through a weak
//! reference handed to them when they are started, so dropping the
//! controller tears everything down.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Duration;
use futures::FutureExt;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::auth::{token, CredentialStore, User, TOKEN_KEY, USER_KEY};
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::SessionError;

use super::activity::ActivityTracker;
use super::monitor::{self, SessionMonitor, Verdict, WarningLatch};
use super::renewal::{RenewalTask, TokenRenewer};
use super::state::{ExtendOutcome, LogoutReason, SessionEvent, SessionSnapshot};

/// Buffer size for the session event channel.
/// Events are rare (login, warning, renewal, logout); 32 leaves headroom for
/// slow consumers.
const EVENT_BUFFER_SIZE: usize = 32;

/// Mutable session state, guarded by one lock.
///
/// Every evaluation and transition happens under this lock without awaiting,
/// so observers only ever see whole transitions.
#[derive(Default)]
struct Slot {
    /// The token the monitor is bound to. The store stays authoritative.
    token: Option<String>,
    user: Option<User>,
    latch: WarningLatch,
    /// Warning banner visible; cleared by dismissal or by the latch resets
    show_warning: bool,
    /// Bumped whenever the monitor is replaced or the session ends, so ticks
    /// from a superseded monitor stop themselves
    generation: u64,
    monitor: Option<SessionMonitor>,
    renewal: Option<RenewalTask>,
}

impl Slot {
    fn is_active(&self) -> bool {
        self.token.is_some()
    }

    /// Bind a token and start a new monitor generation. Stops the previous
    /// monitor; the renewal task belongs to the session and is kept.
    fn bind(&mut self, token: String) -> u64 {
        self.monitor = None;
        self.token = Some(token);
        self.latch.reset();
        self.show_warning = false;
        self.generation += 1;
        self.generation
    }
}

struct Inner {
    config: SessionConfig,
    store: Arc<dyn CredentialStore>,
    renewer: Arc<dyn TokenRenewer>,
    clock: Arc<dyn Clock>,
    activity: ActivityTracker,
    state: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    session: Mutex<Slot>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        }
    }

    fn read_user(&self) -> Option<User> {
        let raw = match self.store.get(USER_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read stored user");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Failed to parse stored user");
                None
            }
        }
    }

    fn has_stored_user(&self) -> bool {
        matches!(self.store.get(USER_KEY), Ok(Some(_)))
    }

    fn persist(&self, token: &str, user: &User) -> anyhow::Result<()> {
        let user_json = serde_json::to_string(user)?;
        self.store.set(TOKEN_KEY, token)?;
        self.store.set(USER_KEY, &user_json)?;
        Ok(())
    }

    fn clear_credentials(&self, reason: LogoutReason) {
        // A token replaced by another writer belongs to that writer
        if reason == LogoutReason::ExternalRemoval && self.read_token().is_some() {
            debug!("Stored token was replaced externally, leaving it in place");
            return;
        }
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to clear stored credential");
            }
        }
    }

    fn publish(&self, slot: &Slot) {
        let snapshot = match (&slot.token, &slot.user) {
            (Some(token), Some(user)) => SessionSnapshot {
                user: Some(user.clone()),
                is_valid: true,
                time_remaining_secs: token::time_remaining(token, self.clock.now()).num_seconds(),
                show_warning: slot.show_warning,
            },
            _ => SessionSnapshot::default(),
        };
        self.state.send_replace(snapshot);
    }

    fn notify(&self, event: SessionEvent) {
        // No receivers is fine; the snapshot carries the state anyway
        let _ = self.events.send(event);
    }

    /// End the session: stop both tasks, clear credentials and derived state.
    fn end_session(&self, slot: &mut Slot, reason: LogoutReason) {
        let was_active = slot.is_active();
        slot.monitor = None;
        slot.renewal = None;
        slot.token = None;
        slot.user = None;
        slot.latch.reset();
        slot.show_warning = false;
        slot.generation += 1;

        self.clear_credentials(reason);
        self.publish(slot);

        if was_active {
            info!(reason = %reason, "Session ended");
            self.notify(SessionEvent::LoggedOut { reason });
        }
    }

    /// One monitor tick for the given generation.
    fn monitor_tick(&self, generation: u64) -> ControlFlow<()> {
        let mut slot = self.lock();
        if slot.generation != generation {
            return ControlFlow::Break(());
        }
        let Some(bound) = slot.token.clone() else {
            return ControlFlow::Break(());
        };

        let stored = self.read_token();
        let now = self.clock.now();
        let threshold = self.config.warning_threshold;
        match monitor::evaluate(&bound, stored.as_deref(), now, threshold, &mut slot.latch) {
            Verdict::Ended(reason) => {
                self.end_session(&mut slot, reason);
                ControlFlow::Break(())
            }
            Verdict::Active {
                time_remaining,
                raise_warning,
            } => {
                if raise_warning {
                    slot.show_warning = true;
                    info!(
                        remaining_secs = time_remaining.num_seconds(),
                        "Session expiring soon"
                    );
                    self.notify(SessionEvent::ExpiryWarning { time_remaining });
                }
                self.publish(&slot);
                ControlFlow::Continue(())
            }
        }
    }

    fn time_remaining(&self) -> Option<Duration> {
        let slot = self.lock();
        let token = slot.token.as_ref()?;
        Some(token::time_remaining(token, self.clock.now()))
    }

    /// Start the monitor for `generation` and make sure the renewal task runs.
    ///
    /// Called without the lock held: the monitor's first tick takes it.
    fn arm(self: &Arc<Self>, generation: u64) {
        let weak = Arc::downgrade(self);
        let monitor = SessionMonitor::start(self.config.monitor_interval, move || {
            match weak.upgrade() {
                Some(inner) => inner.monitor_tick(generation),
                None => ControlFlow::Break(()),
            }
        });

        let mut slot = self.lock();
        if slot.generation != generation || !slot.is_active() {
            return;
        }
        slot.monitor = monitor;
        if !slot.renewal.as_ref().is_some_and(RenewalTask::is_running) {
            slot.renewal = Some(self.spawn_renewal());
        }
    }

    fn spawn_renewal(self: &Arc<Self>) -> RenewalTask {
        let probe: Weak<Self> = Arc::downgrade(self);
        let renewer: Weak<Self> = Arc::downgrade(self);
        RenewalTask::spawn(
            self.config.renewal_interval,
            self.config.renewal,
            self.activity.clone(),
            move || probe.upgrade()?.time_remaining(),
            move || {
                let renewer = renewer.clone();
                async move {
                    if let Some(inner) = renewer.upgrade() {
                        inner.renew(LogoutReason::RenewalFailed).await;
                    }
                }
                .boxed()
            },
        )
    }

    /// Exchange the current token for a fresh one. Any failure ends the
    /// session with `failure_reason`.
    async fn renew(self: &Arc<Self>, failure_reason: LogoutReason) -> ExtendOutcome {
        let current = self.lock().token.clone();
        let Some(sent) = current else {
            debug!("No session to renew");
            self.end_session(&mut self.lock(), failure_reason);
            return ExtendOutcome::SessionEnded;
        };

        // The store is authoritative; a replaced token is left to the monitor
        if self.read_token().as_deref() != Some(sent.as_str()) {
            debug!("Stored token no longer matches the session, not renewing");
            return ExtendOutcome::Superseded;
        }

        let result = self.renewer.renew(&sent).await;

        let mut slot = self.lock();
        if slot.token.as_deref() != Some(sent.as_str())
            || self.read_token().as_deref() != Some(sent.as_str())
        {
            debug!("Session changed while renewing, discarding result");
            return ExtendOutcome::Superseded;
        }

        let fresh = match result {
            Ok(fresh) if token::is_structurally_valid(&fresh) => fresh,
            Ok(_) => {
                warn!(reason = %failure_reason, "Renewal returned a malformed token");
                self.end_session(&mut slot, failure_reason);
                return ExtendOutcome::SessionEnded;
            }
            Err(e) => {
                warn!(error = %e, reason = %failure_reason, "Session renewal failed");
                self.end_session(&mut slot, failure_reason);
                return ExtendOutcome::SessionEnded;
            }
        };

        if let Err(e) = self.store.set(TOKEN_KEY, &fresh) {
            warn!(error = %e, "Failed to persist renewed token");
            self.end_session(&mut slot, failure_reason);
            return ExtendOutcome::SessionEnded;
        }

        let expires_at = token::expires_at(&fresh);
        let generation = slot.bind(fresh);
        drop(slot);

        info!(expires_at = ?expires_at, "Session renewed");
        self.notify(SessionEvent::Renewed);
        self.arm(generation);

        let slot = self.lock();
        if slot.generation == generation && slot.is_active() {
            ExtendOutcome::Renewed
        } else {
            ExtendOutcome::SessionEnded
        }
    }
}

/// Orchestrates login, logout, extension and monitoring of one session.
///
/// Must be used inside a tokio runtime: starting a session spawns the
/// monitor and renewal tasks.
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn CredentialStore>,
        renewer: Arc<dyn TokenRenewer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        let activity = ActivityTracker::new(Arc::clone(&clock));

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                renewer,
                clock,
                activity,
                state,
                events,
                session: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Resume a persisted session at process start.
    ///
    /// A structurally valid, unexpired token with a readable user record
    /// becomes the active session; anything else is cleared from the store.
    /// Returns whether a session is now active.
    pub fn restore(&self) -> bool {
        let inner = &self.inner;
        let token = inner.read_token();
        if token.is_none() && !inner.has_stored_user() {
            debug!("No stored session");
            return false;
        }

        let now = inner.clock.now();
        let usable = token
            .filter(|t| token::is_structurally_valid(t) && !token::is_expired(t, now))
            .zip(inner.read_user());
        let Some((token, user)) = usable else {
            info!("Discarding stale stored session");
            inner.end_session(&mut inner.lock(), LogoutReason::InvalidStoredSession);
            return false;
        };

        let username = user.username.clone();
        let generation = {
            let mut slot = inner.lock();
            slot.renewal = None;
            slot.user = Some(user);
            slot.bind(token)
        };

        info!(username = %username, "Restored stored session");
        inner.notify(SessionEvent::LoggedIn { username });
        inner.arm(generation);
        self.is_authenticated()
    }

    /// Start a session for `user` with `token`.
    ///
    /// A token that fails structural validation is rejected and nothing is
    /// persisted. An accepted token that has already expired ends the session
    /// on the monitor's first tick.
    pub fn login(&self, token: &str, user: User) -> Result<(), SessionError> {
        if !token::is_structurally_valid(token) {
            warn!(username = %user.username, "Rejected login with malformed token");
            return Err(SessionError::InvalidTokenFormat);
        }

        let inner = &self.inner;
        let username = user.username.clone();
        let generation = {
            let mut slot = inner.lock();
            if let Err(e) = inner.persist(token, &user) {
                warn!(error = %e, "Failed to persist login");
                inner.end_session(&mut slot, LogoutReason::InvalidStoredSession);
                return Err(SessionError::Storage(e));
            }
            slot.renewal = None;
            slot.user = Some(user);
            slot.bind(token.to_string())
        };

        info!(
            username = %username,
            expires_at = ?token::expires_at(token),
            "Logged in"
        );
        inner.notify(SessionEvent::LoggedIn { username });
        inner.arm(generation);
        Ok(())
    }

    /// End the session. Idempotent; the reason is diagnostic only.
    pub fn logout(&self, reason: Option<LogoutReason>) {
        let reason = reason.unwrap_or_default();
        let inner = &self.inner;
        inner.end_session(&mut inner.lock(), reason);
    }

    /// Renew the session on request (e.g. from the expiry warning).
    ///
    /// Either the session continues on a fresh token with the warning latch
    /// cleared, or it ends.
    pub async fn extend_session(&self) -> ExtendOutcome {
        self.inner.renew(LogoutReason::ExtensionFailed).await
    }

    /// Re-derive the session from whatever token the store holds now.
    ///
    /// Used after the store changed outside this controller, e.g. another
    /// client signed in. A no-op when no token is stored.
    pub fn refresh_monitoring(&self) {
        let inner = &self.inner;
        let Some(stored) = inner.read_token() else {
            debug!("No stored token, nothing to refresh");
            return;
        };

        let mut slot = inner.lock();
        let generation = if slot.token.as_deref() == Some(stored.as_str()) {
            slot.monitor = None;
            slot.generation += 1;
            slot.generation
        } else {
            let user = inner.read_user();
            let (Some(user), true) = (user, token::is_structurally_valid(&stored)) else {
                info!("Stored session is unusable, clearing it");
                inner.end_session(&mut slot, LogoutReason::InvalidStoredSession);
                return;
            };

            let event = if slot.is_active() {
                SessionEvent::Renewed
            } else {
                SessionEvent::LoggedIn {
                    username: user.username.clone(),
                }
            };
            info!(username = %user.username, "Adopted stored session");
            slot.user = Some(user);
            let generation = slot.bind(stored);
            inner.notify(event);
            generation
        };
        drop(slot);

        inner.arm(generation);
    }

    /// Hide the warning banner. The latch stays set, so the warning is not
    /// raised again for this token.
    pub fn dismiss_warning(&self) {
        let inner = &self.inner;
        let mut slot = inner.lock();
        if slot.show_warning {
            slot.show_warning = false;
            inner.publish(&slot);
        }
    }

    /// Stop background tasks without ending the session (application
    /// shutdown). Persisted credentials are kept for the next start.
    pub fn shutdown(&self) {
        let mut slot = self.inner.lock();
        slot.monitor = None;
        slot.renewal = None;
        slot.generation += 1;
        debug!("Session tasks stopped");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified whenever the snapshot is republished.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    /// Whether the near-expiry warning has been raised for the current token.
    pub fn warning_shown(&self) -> bool {
        self.inner.lock().latch.is_set()
    }

    /// The activity tracker the shell forwards interactions to.
    pub fn activity(&self) -> &ActivityTracker {
        &self.inner.activity
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}
