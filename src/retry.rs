//! Retry timing shared by the status poller and the stapler.
//!
//! Waiting goes through `Clock` so tests can run the loops without real
//! delay. Both bounds are optional; without them a loop runs until the
//! remote side answers.
use crate::error::NotarizeError;
use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

/// Wait between remote calls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub max_wait: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: None,
            max_wait: None,
        }
    }
}

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that advances only when slept on.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
    sleeps: RefCell<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            sleeps: RefCell::new(Vec::new()),
        }
    }
}

impl ManualClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Counts attempts of one retried operation against a policy.
pub struct RetryBudget<'a> {
    operation: &'static str,
    policy: &'a RetryPolicy,
    clock: &'a dyn Clock,
    started: Instant,
    attempts: u32,
}

impl<'a> RetryBudget<'a> {
    pub fn new(operation: &'static str, policy: &'a RetryPolicy, clock: &'a dyn Clock) -> Self {
        Self {
            operation,
            policy,
            clock,
            started: clock.now(),
            attempts: 0,
        }
    }

    /// Account for the next attempt, failing once a bound is exhausted.
    pub fn begin_attempt(&mut self) -> Result<u32, NotarizeError> {
        if !self.within_bounds(self.waited()) {
            return Err(self.limit_reached());
        }
        self.attempts += 1;
        Ok(self.attempts)
    }

    /// Whether another attempt would still be allowed after one more wait.
    pub fn has_next_attempt(&self) -> bool {
        self.within_bounds(self.waited() + self.policy.interval)
    }

    pub fn limit_reached(&self) -> NotarizeError {
        NotarizeError::RetryLimit {
            operation: self.operation,
            attempts: self.attempts,
            waited: self.waited(),
        }
    }

    fn waited(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }

    fn within_bounds(&self, waited: Duration) -> bool {
        let attempts_exhausted = self
            .policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max);
        let wait_exhausted = self.policy.max_wait.is_some_and(|max| waited >= max);
        !(attempts_exhausted || wait_exhausted)
    }

    pub fn wait(&self) {
        self.clock.sleep(self.policy.interval);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval_secs(&self) -> u64 {
        self.policy.interval.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_policy_never_gives_up() {
        let policy = RetryPolicy::default();
        let clock = ManualClock::default();
        let mut budget = RetryBudget::new("status polling", &policy, &clock);
        for expected in 1..=500 {
            assert_eq!(budget.begin_attempt().expect("unbounded"), expected);
            budget.wait();
        }
        assert_eq!(clock.total_slept(), DEFAULT_INTERVAL * 500);
    }

    #[test]
    fn attempt_bound_stops_after_max() {
        let policy = RetryPolicy {
            max_attempts: Some(2),
            ..RetryPolicy::default()
        };
        let clock = ManualClock::default();
        let mut budget = RetryBudget::new("stapling", &policy, &clock);
        budget.begin_attempt().expect("first");
        budget.begin_attempt().expect("second");
        let err = budget.begin_attempt().expect_err("third is over budget");
        assert!(matches!(
            err,
            NotarizeError::RetryLimit {
                operation: "stapling",
                attempts: 2,
                ..
            }
        ));
    }

    #[test]
    fn next_attempt_accounts_for_the_coming_wait() {
        let policy = RetryPolicy {
            interval: Duration::from_secs(30),
            max_attempts: Some(3),
            max_wait: Some(Duration::from_secs(75)),
        };
        let clock = ManualClock::default();
        let mut budget = RetryBudget::new("stapling", &policy, &clock);
        budget.begin_attempt().expect("first");
        assert!(budget.has_next_attempt());
        budget.wait();
        budget.begin_attempt().expect("second");
        assert!(!budget.has_next_attempt(), "60 s + 30 s exceeds the wait bound");
        assert!(matches!(
            budget.limit_reached(),
            NotarizeError::RetryLimit { attempts: 2, .. }
        ));
    }

    #[test]
    fn wait_bound_uses_clock_time() {
        let policy = RetryPolicy {
            interval: Duration::from_secs(10),
            max_attempts: None,
            max_wait: Some(Duration::from_secs(25)),
        };
        let clock = ManualClock::default();
        let mut budget = RetryBudget::new("status polling", &policy, &clock);
        for _ in 0..3 {
            budget.begin_attempt().expect("within wait");
            budget.wait();
        }
        let err = budget.begin_attempt().expect_err("30s waited");
        assert_eq!(
            err.to_string(),
            "status polling gave up after 3 attempts (30 s)"
        );
    }
}
