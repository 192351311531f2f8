//! Session monitor: periodic re-validation of the persisted token.

use std::ops::ControlFlow;

use chrono::{DateTime, Duration, Utc};
use tokio::time::{Instant, MissedTickBehavior};

use crate::auth::token;

use super::state::LogoutReason;
use super::task::TaskHandle;

/// One-shot latch preventing repeated near-expiry warnings.
///
/// Set the first time the remaining validity is observed inside the warning
/// window; cleared only on login, logout and successful renewal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningLatch {
    shown: bool,
}

impl WarningLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation. Returns true only when this observation trips
    /// the latch, i.e. the warning should be raised now.
    pub fn observe(&mut self, time_remaining: Duration, threshold: Duration) -> bool {
        if self.shown || time_remaining <= Duration::zero() || time_remaining > threshold {
            return false;
        }
        self.shown = true;
        true
    }

    pub fn reset(&mut self) {
        self.shown = false;
    }

    pub fn is_set(&self) -> bool {
        self.shown
    }
}

/// Outcome of one monitor evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Active {
        time_remaining: Duration,
        raise_warning: bool,
    },
    Ended(LogoutReason),
}

/// Evaluate the session once.
///
/// `bound` is the token the monitor was started with and `stored` whatever
/// the credential store holds now. The store is authoritative: a missing or
/// different token ends the session even if `bound` is still valid.
pub fn evaluate(
    bound: &str,
    stored: Option<&str>,
    now: DateTime<Utc>,
    warning_threshold: Duration,
    latch: &mut WarningLatch,
) -> Verdict {
    if stored != Some(bound) {
        return Verdict::Ended(LogoutReason::ExternalRemoval);
    }
    if token::is_expired(bound, now) {
        return Verdict::Ended(LogoutReason::TokenExpired);
    }

    let time_remaining = token::time_remaining(bound, now);
    let raise_warning = latch.observe(time_remaining, warning_threshold);
    Verdict::Active {
        time_remaining,
        raise_warning,
    }
}

/// Recurring monitor task for one token.
///
/// Dropping the monitor cancels its timer.
#[derive(Debug)]
pub struct SessionMonitor {
    task: TaskHandle,
}

impl SessionMonitor {
    /// Run `tick` once synchronously, then every `period` until it breaks.
    ///
    /// Returns `None` without arming the timer when the first tick already
    /// ended the session.
    pub fn start<F>(period: std::time::Duration, mut tick: F) -> Option<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        if tick().is_break() {
            return None;
        }

        let task = TaskHandle::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick().is_break() {
                    break;
                }
            }
        });
        Some(Self { task })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::testing::token_expiring_at;

    const THRESHOLD_MINUTES: i64 = 15;

    fn threshold() -> Duration {
        Duration::minutes(THRESHOLD_MINUTES)
    }

    #[test]
    fn test_latch_trips_once_inside_window() {
        let mut latch = WarningLatch::new();
        assert!(!latch.observe(Duration::minutes(20), threshold()));
        assert!(latch.observe(Duration::minutes(15), threshold()));
        assert!(!latch.observe(Duration::minutes(14), threshold()));
        assert!(latch.is_set());

        latch.reset();
        assert!(!latch.is_set());
        assert!(latch.observe(Duration::minutes(1), threshold()));
    }

    #[test]
    fn test_latch_ignores_expired() {
        let mut latch = WarningLatch::new();
        assert!(!latch.observe(Duration::zero(), threshold()));
        assert!(!latch.is_set());
    }

    #[test]
    fn test_evaluate_detects_external_removal() {
        let now = Utc::now();
        let bound = token_expiring_at(now + Duration::minutes(30));
        let replacement = token_expiring_at(now + Duration::minutes(31));
        let mut latch = WarningLatch::new();

        assert_eq!(
            evaluate(&bound, None, now, threshold(), &mut latch),
            Verdict::Ended(LogoutReason::ExternalRemoval)
        );
        assert_eq!(
            evaluate(&bound, Some(&replacement), now, threshold(), &mut latch),
            Verdict::Ended(LogoutReason::ExternalRemoval)
        );
    }

    #[test]
    fn test_evaluate_detects_expiry() {
        let now = Utc::now();
        let bound = token_expiring_at(now - Duration::seconds(1));
        let mut latch = WarningLatch::new();
        assert_eq!(
            evaluate(&bound, Some(&bound), now, threshold(), &mut latch),
            Verdict::Ended(LogoutReason::TokenExpired)
        );
    }

    #[test]
    fn test_evaluate_treats_tampered_token_as_expired() {
        let now = Utc::now();
        let tampered = "eyJhbGciOiJIUzI1NiJ9.tampered.sig";
        let mut latch = WarningLatch::new();
        assert_eq!(
            evaluate(tampered, Some(tampered), now, threshold(), &mut latch),
            Verdict::Ended(LogoutReason::TokenExpired)
        );
    }

    #[test]
    fn test_evaluate_raises_warning_once() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp");
        let bound = token_expiring_at(now + Duration::minutes(10));
        let mut latch = WarningLatch::new();

        assert_eq!(
            evaluate(&bound, Some(&bound), now, threshold(), &mut latch),
            Verdict::Active {
                time_remaining: Duration::minutes(10),
                raise_warning: true,
            }
        );
        assert_eq!(
            evaluate(&bound, Some(&bound), now + Duration::minutes(1), threshold(), &mut latch),
            Verdict::Active {
                time_remaining: Duration::minutes(9),
                raise_warning: false,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_ticks_synchronously_then_on_interval() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let monitor = SessionMonitor::start(std::time::Duration::from_secs(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
        .expect("monitor armed");

        // First evaluation happened before start returned
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(std::time::Duration::from_secs(29)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(std::time::Duration::from_secs(62)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert!(monitor.is_running());

        drop(monitor);
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_not_armed_when_first_tick_breaks() {
        let monitor = SessionMonitor::start(std::time::Duration::from_secs(30), || {
            ControlFlow::Break(())
        });
        assert!(monitor.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_stops_when_tick_breaks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let monitor = SessionMonitor::start(std::time::Duration::from_secs(30), move || {
            if counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .expect("monitor armed");

        tokio::time::sleep(std::time::Duration::from_secs(300)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(!monitor.is_running());
    }
}
