//! # Admission control
//!
//! Sliding-window counter per `(client, action)` pair. Each pair may be
//! admitted `limit` times within any `window`; the controller only answers
//! with a [`Decision`] and never fails the request itself. Limited attempts
//! are not recorded, so a client that keeps retrying is let in as soon as
//! its oldest admitted attempt leaves the window.
//!
//! Windows live in a sharded map: two clients never wait on each other
//! unless their keys hash to the same shard, and updates for one key are
//! serialized by the shard lock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::{ActionClass, ClientKey};
use crate::traits::Clock;

pub const DEFAULT_LIMIT: usize = 2;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted,
    Limited {
        /// Time until the oldest admitted attempt leaves the window
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }
}

/// Budget applied to every `(client, action)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub limit: usize,
    pub window: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}

type WindowKey = (ClientKey, ActionClass);

pub struct AdmissionController {
    windows: DashMap<WindowKey, VecDeque<Instant>>,
    policy: AdmissionPolicy,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Records an attempt for `client` if it fits the budget.
    pub fn admit(&self, client: &ClientKey, action: ActionClass) -> Decision {
        let now = self.clock.now();
        let window = self.policy.window;

        let mut stamps = self.windows.entry((client.clone(), action)).or_default();
        prune(&mut stamps, now, window);

        if stamps.len() < self.policy.limit {
            stamps.push_back(now);
            return Decision::Admitted;
        }

        let retry_after = stamps
            .front()
            .map(|oldest| (*oldest + window).saturating_duration_since(now))
            .unwrap_or(window);
        tracing::debug!(
            client = %client,
            action = action.as_str(),
            retry_after_secs = retry_after.as_secs(),
            "admission limited"
        );
        Decision::Limited { retry_after }
    }

    /// Drops windows with no attempt left inside them.
    /// Returns the number of keys evicted.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let window = self.policy.window;
        let before = self.windows.len();
        self.windows.retain(|_, stamps| {
            prune(stamps, now, window);
            !stamps.is_empty()
        });
        let evicted = before.saturating_sub(self.windows.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.windows.len(), "admission cleanup");
        }
        evicted
    }

    /// Number of tracked `(client, action)` pairs.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

fn prune(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = stamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ManualClock;

    fn controller() -> (Arc<ManualClock>, AdmissionController) {
        let clock = Arc::new(ManualClock::new());
        let ctrl = AdmissionController::new(AdmissionPolicy::default(), clock.clone());
        (clock, ctrl)
    }

    fn ip(addr: &str) -> ClientKey {
        ClientKey::new(addr)
    }

    #[test]
    fn test_boundary_two_per_ten_minutes() {
        let (clock, ctrl) = controller();
        let client = ip("203.0.113.7");

        assert_eq!(ctrl.admit(&client, ActionClass::Comment), Decision::Admitted);
        clock.advance(Duration::from_secs(60));
        assert_eq!(ctrl.admit(&client, ActionClass::Comment), Decision::Admitted);
        clock.advance(Duration::from_secs(60));

        let third = ctrl.admit(&client, ActionClass::Comment);
        assert_eq!(
            third,
            Decision::Limited {
                retry_after: Duration::from_secs(8 * 60)
            }
        );

        clock.advance(DEFAULT_WINDOW);
        assert_eq!(ctrl.admit(&client, ActionClass::Comment), Decision::Admitted);
    }

    #[test]
    fn test_window_slides_with_oldest_attempt() {
        let (clock, ctrl) = controller();
        let client = ip("203.0.113.7");

        ctrl.admit(&client, ActionClass::Feedback);
        clock.advance(Duration::from_secs(5 * 60));
        ctrl.admit(&client, ActionClass::Feedback);
        clock.advance(Duration::from_secs(5 * 60));

        // first attempt just left the window, second is still inside
        assert!(ctrl.admit(&client, ActionClass::Feedback).is_admitted());
        assert!(!ctrl.admit(&client, ActionClass::Feedback).is_admitted());
    }

    #[test]
    fn test_limited_attempts_are_not_recorded() {
        let (clock, ctrl) = controller();
        let client = ip("198.51.100.1");

        ctrl.admit(&client, ActionClass::Comment);
        ctrl.admit(&client, ActionClass::Comment);
        for _ in 0..5 {
            clock.advance(Duration::from_secs(60));
            assert!(!ctrl.admit(&client, ActionClass::Comment).is_admitted());
        }
        clock.advance(Duration::from_secs(5 * 60));
        assert!(ctrl.admit(&client, ActionClass::Comment).is_admitted());
    }

    #[test]
    fn test_keys_and_actions_are_independent() {
        let (_clock, ctrl) = controller();
        let a = ip("10.0.0.1");
        let b = ip("10.0.0.2");

        ctrl.admit(&a, ActionClass::Comment);
        ctrl.admit(&a, ActionClass::Comment);
        assert!(!ctrl.admit(&a, ActionClass::Comment).is_admitted());

        assert!(ctrl.admit(&b, ActionClass::Comment).is_admitted());
        assert!(ctrl.admit(&a, ActionClass::Feedback).is_admitted());
        assert_eq!(ctrl.tracked(), 3);
    }

    #[test]
    fn test_cleanup_evicts_expired_windows() {
        let (clock, ctrl) = controller();
        ctrl.admit(&ip("10.0.0.1"), ActionClass::Comment);
        clock.advance(Duration::from_secs(9 * 60));
        ctrl.admit(&ip("10.0.0.2"), ActionClass::Comment);
        clock.advance(Duration::from_secs(60));

        assert_eq!(ctrl.cleanup(), 1);
        assert_eq!(ctrl.tracked(), 1);
    }

    #[test]
    fn test_zero_limit_always_limits() {
        let clock = Arc::new(ManualClock::new());
        let policy = AdmissionPolicy {
            limit: 0,
            window: Duration::from_secs(30),
        };
        let ctrl = AdmissionController::new(policy, clock);
        assert_eq!(
            ctrl.admit(&ip("10.0.0.1"), ActionClass::Feedback),
            Decision::Limited {
                retry_after: Duration::from_secs(30)
            }
        );
    }

    #[test]
    fn test_concurrent_admits_respect_limit() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let ctrl = Arc::new(AdmissionController::new(AdmissionPolicy::default(), clock));
        let client = ip("192.0.2.44");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ctrl = Arc::clone(&ctrl);
                let client = client.clone();
                std::thread::spawn(move || ctrl.admit(&client, ActionClass::Comment))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Decision::is_admitted)
            .count();
        assert_eq!(admitted, DEFAULT_LIMIT);
    }
}
