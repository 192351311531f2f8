//! Auto-renewal policy: silent renewal for active users.
//!
//! A session is renewed only while the user is recently active and the token
//! is nearing expiry. Renewing idle sessions would make expiry meaningless;
//! renewing far from expiry would hammer the backend.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use futures::future::BoxFuture;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::activity::ActivityTracker;
use super::task::TaskHandle;

/// Backend collaborator that exchanges a valid token for a fresh one.
///
/// Any error (rejection, timeout, transport failure) is a renewal failure.
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    async fn renew(&self, token: &str) -> Result<String>;
}

/// Thresholds deciding when a silent renewal is worthwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    /// Renew only if the user interacted within this window
    pub activity_window: Duration,
    /// Renew only once the remaining validity drops below this
    pub renewal_window: Duration,
}

impl RenewalPolicy {
    /// Derive both windows from a single inactivity ceiling: activity within
    /// half the ceiling, validity below the full ceiling.
    pub fn from_inactivity_ceiling(ceiling: Duration) -> Self {
        Self {
            activity_window: ceiling / 2,
            renewal_window: ceiling,
        }
    }

    pub fn should_renew(&self, since_activity: Option<Duration>, time_remaining: Duration) -> bool {
        let Some(since_activity) = since_activity else {
            return false;
        };
        since_activity < self.activity_window
            && time_remaining > Duration::zero()
            && time_remaining < self.renewal_window
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self::from_inactivity_ceiling(Duration::minutes(10))
    }
}

/// Recurring renewal check.
///
/// Each tick asks `time_remaining` for the current session (`None` when
/// there is none) and, when the policy agrees, awaits `renew` exactly once.
/// Dropping the task cancels its timer.
#[derive(Debug)]
pub struct RenewalTask {
    task: TaskHandle,
}

impl RenewalTask {
    pub fn spawn<P, R>(
        period: std::time::Duration,
        policy: RenewalPolicy,
        activity: ActivityTracker,
        mut time_remaining: P,
        renew: R,
    ) -> Self
    where
        P: FnMut() -> Option<Duration> + Send + 'static,
        R: Fn() -> BoxFuture<'static, ()> + Send + 'static,
    {
        let task = TaskHandle::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(remaining) = time_remaining() else {
                    break;
                };
                let since_activity = activity.time_since_last_activity();
                if policy.should_renew(since_activity, remaining) {
                    debug!(
                        remaining_secs = remaining.num_seconds(),
                        idle_secs = since_activity.map(|d| d.num_seconds()),
                        "Renewing session"
                    );
                    renew().await;
                }
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use futures::FutureExt;

    use super::*;
    use crate::clock::TokioClock;

    fn policy() -> RenewalPolicy {
        RenewalPolicy::from_inactivity_ceiling(Duration::minutes(10))
    }

    #[test]
    fn test_policy_windows_from_ceiling() {
        let policy = policy();
        assert_eq!(policy.activity_window, Duration::minutes(5));
        assert_eq!(policy.renewal_window, Duration::minutes(10));
        assert_eq!(RenewalPolicy::default(), policy);
    }

    #[test]
    fn test_should_renew_when_active_and_near_expiry() {
        assert!(policy().should_renew(Some(Duration::minutes(1)), Duration::minutes(9)));
    }

    #[test]
    fn test_no_renewal_without_activity() {
        let policy = policy();
        assert!(!policy.should_renew(None, Duration::minutes(3)));
        assert!(!policy.should_renew(Some(Duration::minutes(5)), Duration::minutes(3)));
        assert!(!policy.should_renew(Some(Duration::minutes(30)), Duration::seconds(1)));
    }

    #[test]
    fn test_no_renewal_far_from_or_past_expiry() {
        let policy = policy();
        assert!(!policy.should_renew(Some(Duration::zero()), Duration::minutes(10)));
        assert!(!policy.should_renew(Some(Duration::zero()), Duration::minutes(25)));
        assert!(!policy.should_renew(Some(Duration::zero()), Duration::zero()));
    }

    #[test]
    fn test_independent_windows() {
        let policy = RenewalPolicy {
            activity_window: Duration::minutes(2),
            renewal_window: Duration::minutes(30),
        };
        assert!(policy.should_renew(Some(Duration::minutes(1)), Duration::minutes(25)));
        assert!(!policy.should_renew(Some(Duration::minutes(3)), Duration::minutes(25)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_renews_once_per_eligible_tick() {
        let activity = ActivityTracker::new(Arc::new(TokioClock::new()));
        activity.record_activity();
        let renewals = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&renewals);

        let _task = RenewalTask::spawn(
            std::time::Duration::from_secs(120),
            policy(),
            activity.clone(),
            || Some(Duration::minutes(8)),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            },
        );

        // Ticks at 2m and 4m: activity is 2m then 4m old
        tokio::time::sleep(std::time::Duration::from_secs(250)).await;
        assert_eq!(renewals.load(Ordering::SeqCst), 2);

        // Tick at 6m: activity is 6m old, past the window
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(renewals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_exits_without_session() {
        let activity = ActivityTracker::new(Arc::new(TokioClock::new()));
        let remaining = Arc::new(Mutex::new(Some(Duration::minutes(8))));
        let probe = Arc::clone(&remaining);

        let task = RenewalTask::spawn(
            std::time::Duration::from_secs(120),
            policy(),
            activity,
            move || *probe.lock().unwrap(),
            || async {}.boxed(),
        );

        tokio::time::sleep(std::time::Duration::from_secs(130)).await;
        assert!(task.is_running());

        *remaining.lock().unwrap() = None;
        tokio::time::sleep(std::time::Duration::from_secs(130)).await;
        assert!(!task.is_running());
    }
}
