//! Runtime configuration for the authentication services.
//!
//! Defaults match the hospital policy (30-minute sliding sessions, 5 failures
//! lock an account for 24 hours). Every value can be overridden through
//! `NURSEGATE_*` environment variables.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use thiserror::Error;

use nursegate_auth::{
    DEFAULT_SESSION_WINDOW_MINUTES, LOCK_DURATION_HOURS, LoginLockPolicy, MAX_FAILED_ATTEMPTS,
    SessionPolicy,
};

pub const ENV_SESSION_WINDOW_MINUTES: &str = "NURSEGATE_SESSION_WINDOW_MINUTES";
pub const ENV_MAX_FAILED_ATTEMPTS: &str = "NURSEGATE_MAX_FAILED_ATTEMPTS";
pub const ENV_LOCK_DURATION_HOURS: &str = "NURSEGATE_LOCK_DURATION_HOURS";
pub const ENV_STORE_TIMEOUT_MS: &str = "NURSEGATE_STORE_TIMEOUT_MS";
pub const ENV_COOKIE_SECURE: &str = "NURSEGATE_COOKIE_SECURE";
pub const ENV_COOKIE_NAME: &str = "NURSEGATE_COOKIE_NAME";

pub const DEFAULT_COOKIE_NAME: &str = "nursegate_session";

/// One week.
pub const MAX_SESSION_WINDOW_MINUTES: u64 = 7 * 24 * 60;
pub const MAX_FAILED_ATTEMPTS_LIMIT: u64 = 1_000;
/// One year.
pub const MAX_LOCK_DURATION_HOURS: u64 = 365 * 24;
pub const MAX_STORE_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub session_window: Duration,
    pub max_failed_attempts: u32,
    pub lock_duration: Duration,
    /// Upper bound on a single store round-trip.
    pub store_timeout: Duration,
    /// Delay before the single retry of a failed session resolution.
    pub resolve_retry_backoff: Duration,
    /// How many times a lost compare-and-set on the failure counter is retried.
    pub failure_update_retries: u32,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_window: Duration::from_secs(DEFAULT_SESSION_WINDOW_MINUTES as u64 * 60),
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lock_duration: Duration::from_secs(LOCK_DURATION_HOURS as u64 * 3600),
            store_timeout: Duration::from_secs(2),
            resolve_retry_backoff: Duration::from_millis(50),
            failure_update_retries: 3,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: true,
        }
    }
}

impl AuthConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset variables keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(minutes) = parse_bounded(
            &lookup,
            ENV_SESSION_WINDOW_MINUTES,
            MAX_SESSION_WINDOW_MINUTES,
            "minutes between 1 and 10080",
        )? {
            cfg.session_window = Duration::from_secs(minutes * 60);
        }
        if let Some(max) = parse_bounded(
            &lookup,
            ENV_MAX_FAILED_ATTEMPTS,
            MAX_FAILED_ATTEMPTS_LIMIT,
            "an attempt count between 1 and 1000",
        )? {
            cfg.max_failed_attempts = max as u32;
        }
        if let Some(hours) = parse_bounded(
            &lookup,
            ENV_LOCK_DURATION_HOURS,
            MAX_LOCK_DURATION_HOURS,
            "hours between 1 and 8760",
        )? {
            cfg.lock_duration = Duration::from_secs(hours * 3600);
        }
        if let Some(ms) = parse_bounded(
            &lookup,
            ENV_STORE_TIMEOUT_MS,
            MAX_STORE_TIMEOUT_MS,
            "milliseconds between 1 and 60000",
        )? {
            cfg.store_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_COOKIE_SECURE) {
            cfg.cookie_secure = parse_bool(ENV_COOKIE_SECURE, &raw)?;
        }
        if let Some(name) = lookup(ENV_COOKIE_NAME) {
            let name = name.trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                return Err(ConfigError::Invalid {
                    var: ENV_COOKIE_NAME,
                    expected: "a cookie token ([A-Za-z0-9_-]+)",
                    value: name.to_string(),
                });
            }
            cfg.cookie_name = name.to_string();
        }

        Ok(cfg)
    }

    pub fn lock_policy(&self) -> LoginLockPolicy {
        LoginLockPolicy::new(self.max_failed_attempts, to_chrono(self.lock_duration))
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy::new(to_chrono(self.session_window))
    }
}

fn to_chrono(d: Duration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or(ChronoDuration::MAX)
}

/// Parse an integer in `1..=max`; anything else is rejected at startup.
fn parse_bounded<F>(
    lookup: &F,
    var: &'static str,
    max: u64,
    expected: &'static str,
) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(v) if (1..=max).contains(&v) => Ok(Some(v)),
        _ => Err(ConfigError::Invalid {
            var,
            expected,
            value: raw,
        }),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a boolean",
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AuthConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, AuthConfig::default());
        assert_eq!(cfg.session_window, Duration::from_secs(30 * 60));
        assert_eq!(cfg.max_failed_attempts, 5);
        assert_eq!(cfg.lock_duration, Duration::from_secs(24 * 3600));
        assert!(cfg.cookie_secure);
        assert_eq!(cfg.cookie_name, "nursegate_session");
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = AuthConfig::from_lookup(lookup(&[
            (ENV_SESSION_WINDOW_MINUTES, "15"),
            (ENV_MAX_FAILED_ATTEMPTS, "3"),
            (ENV_LOCK_DURATION_HOURS, "1"),
            (ENV_STORE_TIMEOUT_MS, "250"),
            (ENV_COOKIE_SECURE, "false"),
            (ENV_COOKIE_NAME, "ward_sid"),
        ]))
        .unwrap();

        assert_eq!(cfg.session_window, Duration::from_secs(15 * 60));
        assert_eq!(cfg.max_failed_attempts, 3);
        assert_eq!(cfg.lock_duration, Duration::from_secs(3600));
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));
        assert!(!cfg.cookie_secure);
        assert_eq!(cfg.cookie_name, "ward_sid");

        assert_eq!(cfg.lock_policy().max_failed_attempts(), 3);
        assert_eq!(cfg.session_policy().window(), ChronoDuration::minutes(15));
    }

    proptest::proptest! {
        #[test]
        fn any_positive_window_is_accepted(minutes in 1u64..=10_000) {
            let raw = minutes.to_string();
            let cfg = AuthConfig::from_lookup(lookup(&[(ENV_SESSION_WINDOW_MINUTES, raw.as_str())])).unwrap();
            proptest::prop_assert_eq!(cfg.session_window, Duration::from_secs(minutes * 60));
            proptest::prop_assert_eq!(
                cfg.session_policy().window(),
                ChronoDuration::minutes(minutes as i64)
            );
        }
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let err = AuthConfig::from_lookup(lookup(&[(ENV_MAX_FAILED_ATTEMPTS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_MAX_FAILED_ATTEMPTS, .. }));

        assert!(AuthConfig::from_lookup(lookup(&[(ENV_SESSION_WINDOW_MINUTES, "soon")])).is_err());
        assert!(AuthConfig::from_lookup(lookup(&[(ENV_COOKIE_SECURE, "maybe")])).is_err());
        assert!(AuthConfig::from_lookup(lookup(&[(ENV_COOKIE_NAME, "bad name;")])).is_err());
    }

    #[test]
    fn rejects_out_of_range_durations() {
        for (var, raw) in [
            (ENV_SESSION_WINDOW_MINUTES, "1000000000000"),
            (ENV_SESSION_WINDOW_MINUTES, "10081"),
            (ENV_LOCK_DURATION_HOURS, "100000000000"),
            (ENV_LOCK_DURATION_HOURS, "8761"),
            (ENV_STORE_TIMEOUT_MS, "60001"),
            (ENV_MAX_FAILED_ATTEMPTS, "4294967296"),
            (ENV_MAX_FAILED_ATTEMPTS, "1001"),
            (ENV_SESSION_WINDOW_MINUTES, "18446744073709551616"),
        ] {
            let err = AuthConfig::from_lookup(lookup(&[(var, raw)])).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { var: v, value, .. } if *v == var && value == raw),
                "{var}={raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn upper_bounds_are_inclusive_and_usable() {
        let cfg = AuthConfig::from_lookup(lookup(&[
            (ENV_SESSION_WINDOW_MINUTES, "10080"),
            (ENV_LOCK_DURATION_HOURS, "8760"),
            (ENV_STORE_TIMEOUT_MS, "60000"),
            (ENV_MAX_FAILED_ATTEMPTS, "1000"),
        ]))
        .unwrap();

        let now = chrono::Utc::now();
        let state = cfg.lock_policy().on_failure(999, now);
        assert_eq!(state.locked_until, Some(now + ChronoDuration::hours(8760)));
        assert_eq!(cfg.session_policy().expires_at(now), now + ChronoDuration::days(7));
    }
}
