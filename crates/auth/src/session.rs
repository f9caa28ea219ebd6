//! Session id generation and sliding expiry.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

use nursegate_core::UserId;

use crate::{ClientMeta, Session, SessionId};

/// Default idle window; every successful resolution pushes expiry this far out.
pub const DEFAULT_SESSION_WINDOW_MINUTES: i64 = 30;

/// Random bytes per session token.
pub const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to generate session id: {0}")]
pub struct SessionIdError(String);

/// Session lifetime rules (pure; the only side effect is drawing randomness).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    window: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            window: Duration::minutes(DEFAULT_SESSION_WINDOW_MINUTES),
        }
    }
}

impl SessionPolicy {
    /// `window` is clamped to at least one second.
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::seconds(1)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Fresh token from the OS CSPRNG, URL-safe base64 without padding.
    pub fn generate_id(&self) -> Result<SessionId, SessionIdError> {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SessionIdError(e.to_string()))?;
        Ok(SessionId::from_token(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Saturates at `DateTime::<Utc>::MAX_UTC`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Build a new session starting at `now`.
    pub fn issue(
        &self,
        user_id: UserId,
        client: ClientMeta,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionIdError> {
        Ok(Session {
            id: self.generate_id()?,
            user_id,
            created_at: now,
            expires_at: self.expires_at(now),
            client,
        })
    }

    /// A session is dead once `expires_at <= now`.
    pub fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.expires_at <= now
    }

    /// New expiry for an access at `now`.
    ///
    /// Never earlier than the creation time, so `expires_at >= created_at`
    /// holds even if the clock steps backwards.
    pub fn renewed_expiry(&self, session: &Session, now: DateTime<Utc>) -> DateTime<Utc> {
        self.expires_at(now).max(session.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn generated_ids_are_unique_and_url_safe() {
        let policy = SessionPolicy::default();
        let ids: HashSet<String> = (0..256)
            .map(|_| policy.generate_id().unwrap().into_inner())
            .collect();
        assert_eq!(ids.len(), 256);
        for id in &ids {
            assert_eq!(id.len(), 43);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn issued_session_expires_after_window() {
        let policy = SessionPolicy::new(Duration::minutes(30));
        let session = policy.issue(UserId::new(), ClientMeta::default(), t0()).unwrap();
        assert_eq!(session.created_at, t0());
        assert_eq!(session.expires_at, t0() + Duration::minutes(30));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let policy = SessionPolicy::new(Duration::minutes(30));
        let session = policy.issue(UserId::new(), ClientMeta::default(), t0()).unwrap();
        assert!(!policy.is_expired(&session, session.expires_at - Duration::seconds(1)));
        assert!(policy.is_expired(&session, session.expires_at));
    }

    #[test]
    fn renewal_slides_from_access_time() {
        let policy = SessionPolicy::new(Duration::minutes(30));
        let session = policy.issue(UserId::new(), ClientMeta::default(), t0()).unwrap();
        let access = t0() + Duration::minutes(29);
        assert_eq!(
            policy.renewed_expiry(&session, access),
            access + Duration::minutes(30)
        );
    }

    #[test]
    fn oversized_window_saturates_instead_of_overflowing() {
        let policy = SessionPolicy::new(Duration::MAX);
        let session = policy.issue(UserId::new(), ClientMeta::default(), t0()).unwrap();
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!policy.is_expired(&session, t0()));
    }

    #[test]
    fn renewal_never_precedes_creation() {
        let policy = SessionPolicy::new(Duration::minutes(30));
        let session = policy.issue(UserId::new(), ClientMeta::default(), t0()).unwrap();
        let skewed = t0() - Duration::hours(2);
        assert!(policy.renewed_expiry(&session, skewed) >= session.created_at);
    }
}
