//! User activity tracking.
//!
//! The tracker holds a single atomic timestamp so it can be stamped on every
//! pointer movement without measurable cost.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::clock::Clock;

use super::task::TaskHandle;

/// Sentinel for "no activity recorded yet"
const NEVER: i64 = i64::MIN;

/// Passive interaction signals the application shell forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivitySignal {
    PointerMove,
    KeyPress,
    Scroll,
    Touch,
}

impl ActivitySignal {
    pub const ALL: [ActivitySignal; 4] = [
        ActivitySignal::PointerMove,
        ActivitySignal::KeyPress,
        ActivitySignal::Scroll,
        ActivitySignal::Touch,
    ];
}

/// Records the instant of the most recent user interaction.
///
/// Clones share the same timestamp.
#[derive(Clone)]
pub struct ActivityTracker {
    last_activity_ms: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
}

impl ActivityTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            last_activity_ms: Arc::new(AtomicI64::new(NEVER)),
            clock,
        }
    }

    /// Stamp "now" as the last activity. Never moves the timestamp backwards.
    pub fn record_activity(&self) {
        let now = self.clock.now().timestamp_millis();
        self.last_activity_ms.fetch_max(now, Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        match self.last_activity_ms.load(Ordering::Relaxed) {
            NEVER => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// Time since the last recorded interaction, `None` if there never was one.
    pub fn time_since_last_activity(&self) -> Option<Duration> {
        let last = self.last_activity()?;
        Some((self.clock.now() - last).max(Duration::zero()))
    }

    /// Subscribe to every signal type on the shell's interaction channel.
    ///
    /// One subscription is held per signal type; all of them end together
    /// when the returned listeners are stopped or dropped.
    pub fn listen(&self, signals: &broadcast::Sender<ActivitySignal>) -> ActivityListeners {
        let tasks = ActivitySignal::ALL
            .iter()
            .map(|&kind| {
                let mut rx = signals.subscribe();
                let tracker = self.clone();
                TaskHandle::spawn(async move {
                    loop {
                        match rx.recv().await {
                            Ok(signal) if signal == kind => tracker.record_activity(),
                            Ok(_) => {}
                            // Dropped signals still mean the user was busy
                            Err(RecvError::Lagged(_)) => tracker.record_activity(),
                            Err(RecvError::Closed) => break,
                        }
                    }
                    debug!(signal = ?kind, "Activity subscription closed");
                })
            })
            .collect();

        ActivityListeners { tasks }
    }
}

/// Live activity subscriptions, torn down together.
pub struct ActivityListeners {
    tasks: Vec<TaskHandle>,
}

impl ActivityListeners {
    pub fn len(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stop(self) {
        drop(self);
    }
}
