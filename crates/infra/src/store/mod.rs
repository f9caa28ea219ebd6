//! Credential persistence boundary.
//!
//! The authentication services depend on [`CredentialStore`] only, never on a
//! storage engine. Implementations must make each method atomic with respect
//! to the user it touches:
//!
//! - `update_failure_state` is a compare-and-set on the attempt counter, so two
//!   concurrent failures for one account can never both write the same count.
//! - `clear_failure_state` is the same compare-and-set, so a reset after a
//!   successful login never erases a failure recorded in the meantime.
//! - `replace_sessions_for_user` deletes every session of the user and inserts
//!   the new one in one step; readers never see zero or two sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use nursegate_auth::{FailureState, Session, SessionId, UserCredential};
use nursegate_core::UserId;

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryCredentialStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresCredentialStore;

/// Store operation error.
///
/// These are infrastructure failures; services map them to
/// `AuthError::Internal` and never expose them to end users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store operation '{0}' timed out")]
    Timeout(&'static str),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an account by its exact login name.
    async fn find_user_by_login_name(
        &self,
        login_name: &str,
    ) -> Result<Option<UserCredential>, StoreError>;

    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<UserCredential>, StoreError>;

    /// Insert a new account. Fails with `Conflict` if the login name is taken.
    async fn insert_user(&self, user: UserCredential) -> Result<(), StoreError>;

    /// Write `next` only if the stored counter still equals `expected_attempts`.
    ///
    /// Returns `Ok(false)` when the counter moved (or the user is gone); the
    /// caller re-reads and re-applies its policy.
    async fn update_failure_state(
        &self,
        user_id: UserId,
        expected_attempts: u32,
        next: FailureState,
    ) -> Result<bool, StoreError>;

    /// Reset the counter to 0 and clear the lock, only if the stored counter
    /// still equals `expected_attempts`.
    ///
    /// Returns `Ok(false)` when the counter moved (or the user is gone).
    async fn clear_failure_state(
        &self,
        user_id: UserId,
        expected_attempts: u32,
    ) -> Result<bool, StoreError>;

    /// Flip the active flag. Deactivation also deletes the user's sessions.
    ///
    /// Returns `Ok(false)` if the user does not exist.
    async fn set_active(&self, user_id: UserId, active: bool) -> Result<bool, StoreError>;

    /// Administrative unlock: reset the counter, clear the lock, delete sessions.
    ///
    /// Returns `Ok(false)` if the user does not exist.
    async fn unlock(&self, user_id: UserId) -> Result<bool, StoreError>;

    /// Insert a session without touching the user's other sessions.
    async fn create_session(&self, session: Session) -> Result<(), StoreError>;

    /// Atomically delete all sessions of `session.user_id` and insert `session`.
    ///
    /// Returns `Ok(false)` without writing if the user is missing or inactive.
    async fn replace_sessions_for_user(&self, session: Session) -> Result<bool, StoreError>;

    /// Returns the number of sessions removed.
    async fn delete_sessions_for_user(&self, user_id: UserId) -> Result<u64, StoreError>;

    async fn find_session_by_id(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Set a new expiry. Returns `Ok(false)` if the session is gone.
    async fn renew_session(
        &self,
        id: &SessionId,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Returns `Ok(false)` if the session did not exist.
    async fn delete_session(&self, id: &SessionId) -> Result<bool, StoreError>;
}
