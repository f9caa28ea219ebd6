//! Persisted records owned by the credential store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nursegate_core::UserId;

use crate::{CurrentUser, Role};

/// A user account as the authentication core sees it.
///
/// # Invariants
/// - `failed_login_attempts` returns to 0 only on a successful login or an
///   administrative unlock.
/// - `locked_until`, when written, is strictly after the time of writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    pub id: UserId,
    /// Unique login name (e.g. staff number).
    pub login_name: String,
    /// PHC-formatted password hash.
    pub password_hash: String,
    pub is_active: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub roles: Vec<Role>,
}

impl UserCredential {
    /// A fresh, active account with a clean failure record.
    pub fn new(login_name: impl Into<String>, password_hash: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            id: UserId::new(),
            login_name: login_name.into(),
            password_hash: password_hash.into(),
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            roles,
        }
    }

    pub fn to_current_user(&self) -> CurrentUser {
        CurrentUser::new(self.id, self.login_name.clone(), self.roles.clone())
    }
}

/// Opaque, unguessable session token.
///
/// `Debug` is redacted so the token never reaches logs by accident.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionId(<redacted>)")
    }
}

/// Client details captured at login for audit only.
///
/// Never consulted by authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn new(ip: Option<String>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }
}

/// A persisted login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub client: ClientMeta,
}

/// What a successful login hands back to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub user: CurrentUser,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_debug_is_redacted() {
        let id = SessionId::from_token("super-secret-token");
        let rendered = format!("{id:?}");
        assert!(!rendered.contains("super-secret-token"));
    }

    #[test]
    fn new_credential_starts_clean() {
        let cred = UserCredential::new("nurse001", "$argon2id$...", vec![Role::GeneralUser]);
        assert!(cred.is_active);
        assert_eq!(cred.failed_login_attempts, 0);
        assert!(cred.locked_until.is_none());
        assert_eq!(cred.to_current_user().login_name, "nurse001");
    }
}
