//! Brute-force lockout state machine.
//!
//! The failure counter and the lock timestamp are stored separately. Whether an
//! account is locked depends only on `locked_until > now`, so an expired lock
//! needs no sweep: the next request simply observes it has lapsed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures that trigger a lock.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long a triggered lock lasts.
pub const LOCK_DURATION_HOURS: i64 = 24;

/// Lock status of an account at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked { attempts: u32 },
    Locked { until: DateTime<Utc> },
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked { .. })
    }
}

/// Counter and lock values to persist after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureState {
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl FailureState {
    pub fn cleared() -> Self {
        Self {
            attempts: 0,
            locked_until: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some()
    }
}

/// Lockout policy (pure; no I/O).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginLockPolicy {
    max_failed_attempts: u32,
    lock_duration: Duration,
}

impl Default for LoginLockPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lock_duration: Duration::hours(LOCK_DURATION_HOURS),
        }
    }
}

impl LoginLockPolicy {
    /// `max_failed_attempts` is clamped to at least 1 and `lock_duration` to
    /// at least one second, so a lock is always strictly in the future.
    pub fn new(max_failed_attempts: u32, lock_duration: Duration) -> Self {
        Self {
            max_failed_attempts: max_failed_attempts.max(1),
            lock_duration: lock_duration.max(Duration::seconds(1)),
        }
    }

    pub fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    pub fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    /// Locked iff `locked_until` is present and still in the future.
    ///
    /// A high `attempts` value never locks on its own once the timestamp has
    /// lapsed.
    pub fn check_lock(
        &self,
        attempts: u32,
        locked_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> LockState {
        match locked_until {
            Some(until) if until > now => LockState::Locked { until },
            _ => LockState::Unlocked { attempts },
        }
    }

    /// State after one more failed attempt at `now`.
    ///
    /// A lock that would end past the representable range ends at
    /// `DateTime::<Utc>::MAX_UTC` instead.
    pub fn on_failure(&self, attempts: u32, now: DateTime<Utc>) -> FailureState {
        let attempts = attempts.saturating_add(1);
        let locked_until = if attempts >= self.max_failed_attempts {
            Some(
                now.checked_add_signed(self.lock_duration)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
        } else {
            None
        };

        FailureState {
            attempts,
            locked_until,
        }
    }

    /// State after a successful login.
    pub fn on_success(&self) -> FailureState {
        FailureState::cleared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Replay `n` consecutive failures, one minute apart, from a clean record.
    fn fail_n_times(policy: &LoginLockPolicy, n: u32) -> (FailureState, DateTime<Utc>) {
        let mut state = FailureState::cleared();
        let mut at = t0();
        for i in 0..n {
            at = t0() + Duration::minutes(i as i64);
            state = policy.on_failure(state.attempts, at);
        }
        (state, at)
    }

    #[test]
    fn fifth_failure_locks_for_exactly_24_hours() {
        let policy = LoginLockPolicy::default();
        let (state, last_failure) = fail_n_times(&policy, 5);

        assert_eq!(state.attempts, 5);
        assert_eq!(state.locked_until, Some(last_failure + Duration::hours(24)));
        assert!(
            policy
                .check_lock(state.attempts, state.locked_until, last_failure)
                .is_locked()
        );
    }

    #[test]
    fn lock_lapses_without_any_reset() {
        let policy = LoginLockPolicy::default();
        let (state, last_failure) = fail_n_times(&policy, 5);
        let until = state.locked_until.unwrap();

        assert!(policy.check_lock(5, Some(until), until - Duration::seconds(1)).is_locked());
        // Boundary: `locked_until > now` is required to be locked.
        assert_eq!(
            policy.check_lock(5, Some(until), until),
            LockState::Unlocked { attempts: 5 }
        );
        assert!(
            !policy
                .check_lock(5, Some(until), last_failure + Duration::hours(25))
                .is_locked()
        );
    }

    #[test]
    fn counter_alone_never_locks() {
        let policy = LoginLockPolicy::default();
        assert_eq!(
            policy.check_lock(42, None, t0()),
            LockState::Unlocked { attempts: 42 }
        );
    }

    #[test]
    fn failure_after_lapsed_lock_relocks_immediately() {
        let policy = LoginLockPolicy::default();
        let later = t0() + Duration::hours(30);
        let state = policy.on_failure(5, later);
        assert_eq!(state.attempts, 6);
        assert_eq!(state.locked_until, Some(later + Duration::hours(24)));
    }

    #[test]
    fn success_clears_everything() {
        let policy = LoginLockPolicy::default();
        assert_eq!(policy.on_success(), FailureState::cleared());
    }

    #[test]
    fn oversized_lock_duration_saturates_instead_of_overflowing() {
        let policy = LoginLockPolicy::new(1, Duration::MAX);
        let state = policy.on_failure(0, t0());
        assert_eq!(state.locked_until, Some(DateTime::<Utc>::MAX_UTC));
        assert!(policy.check_lock(state.attempts, state.locked_until, t0()).is_locked());
    }

    #[test]
    fn custom_policy_is_clamped() {
        let policy = LoginLockPolicy::new(0, Duration::zero());
        assert_eq!(policy.max_failed_attempts(), 1);
        let state = policy.on_failure(0, t0());
        assert!(state.locked_until.unwrap() > t0());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: four or fewer consecutive failures never lock.
        #[test]
        fn up_to_four_failures_stay_unlocked(n in 0u32..=4, offset_mins in 0i64..10_000) {
            let policy = LoginLockPolicy::default();
            let (state, at) = fail_n_times(&policy, n);
            let now = at + Duration::minutes(offset_mins);
            prop_assert_eq!(state.locked_until, None);
            prop_assert_eq!(
                policy.check_lock(state.attempts, state.locked_until, now),
                LockState::Unlocked { attempts: n }
            );
        }

        /// Property: the lock timestamp is the time of the failure that
        /// reached the threshold plus the lock duration, for any start count.
        #[test]
        fn reaching_threshold_locks_at_failure_time_plus_duration(
            prior in 0u32..1_000,
            secs in 0i64..10_000_000,
        ) {
            let policy = LoginLockPolicy::default();
            let now = t0() + Duration::seconds(secs);
            let state = policy.on_failure(prior, now);

            prop_assert_eq!(state.attempts, prior + 1);
            if prior + 1 >= MAX_FAILED_ATTEMPTS {
                prop_assert_eq!(state.locked_until, Some(now + Duration::hours(LOCK_DURATION_HOURS)));
                prop_assert!(policy.check_lock(state.attempts, state.locked_until, now).is_locked());
            } else {
                prop_assert_eq!(state.locked_until, None);
            }
        }

        /// Property: success resets regardless of the prior counter.
        #[test]
        fn success_resets_any_counter(_prior in 0u32..u32::MAX) {
            let policy = LoginLockPolicy::default();
            prop_assert_eq!(policy.on_success(), FailureState { attempts: 0, locked_until: None });
        }
    }
}
