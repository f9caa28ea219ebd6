//! Account administration: provisioning, unlock, activation.
//!
//! Every operation passes the caller through the authorization gate with the
//! administrator roles before touching the store.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument};

use nursegate_auth::{
    AuthError, CurrentUser, PasswordHasher, Role, UserCredential, authorize,
};
use nursegate_core::{Clock, UserId};

use crate::audit::{AuditEvent, AuditKind, AuditOutcome, AuditSink};
use crate::config::AuthConfig;
use crate::service::{bounded, store_failure};
use crate::store::{CredentialStore, StoreError};

/// Longest accepted login name.
pub const MAX_LOGIN_NAME_LEN: usize = 64;

/// Shortest accepted password at provisioning.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Actor name recorded for start-up provisioning.
const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("unknown user {0}")]
    UnknownUser(UserId),

    #[error("login name '{0}' is already taken")]
    DuplicateLoginName(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub struct AccountAdministration {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl AccountAdministration {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            audit,
            clock,
            store_timeout: config.store_timeout,
        }
    }

    /// Create an active account with a clean failure record.
    #[instrument(skip_all, fields(login_name = %login_name))]
    pub async fn provision_user(
        &self,
        actor: Option<CurrentUser>,
        login_name: &str,
        password: &str,
        roles: Vec<Role>,
    ) -> Result<CurrentUser, AdminError> {
        let actor = authorize(actor, &Role::ADMINISTRATORS).into_result()?;
        self.insert(&actor.login_name, login_name, password, roles).await
    }

    /// Provision a super admin at start-up, bypassing the gate.
    ///
    /// Returns `Ok(None)` when the login name already exists.
    #[instrument(skip_all, fields(login_name = %login_name))]
    pub async fn bootstrap_super_admin(
        &self,
        login_name: &str,
        password: &str,
    ) -> Result<Option<CurrentUser>, AdminError> {
        match self
            .insert(SYSTEM_ACTOR, login_name, password, vec![Role::SuperAdmin])
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(AdminError::DuplicateLoginName(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reset the failure counter, clear the lock and drop the user's sessions.
    #[instrument(skip(self, actor))]
    pub async fn unlock_account(
        &self,
        actor: Option<CurrentUser>,
        user_id: UserId,
    ) -> Result<(), AdminError> {
        let actor = authorize(actor, &Role::ADMINISTRATORS).into_result()?;

        let found = bounded("unlock", self.store_timeout, self.store.unlock(user_id))
            .await
            .map_err(|e| store_failure("unlock", e))?;
        if !found {
            return Err(AdminError::UnknownUser(user_id));
        }

        self.record(&actor.login_name, user_id, AuditKind::AccountUnlocked);
        info!(user_id = %user_id, actor = %actor.login_name, "account unlocked");
        Ok(())
    }

    /// Enable or disable an account. Disabling also ends its sessions.
    #[instrument(skip(self, actor))]
    pub async fn set_account_active(
        &self,
        actor: Option<CurrentUser>,
        user_id: UserId,
        active: bool,
    ) -> Result<(), AdminError> {
        let actor = authorize(actor, &Role::ADMINISTRATORS).into_result()?;

        let found = bounded(
            "set_active",
            self.store_timeout,
            self.store.set_active(user_id, active),
        )
        .await
        .map_err(|e| store_failure("set_active", e))?;
        if !found {
            return Err(AdminError::UnknownUser(user_id));
        }

        let kind = if active {
            AuditKind::AccountActivated
        } else {
            AuditKind::AccountDeactivated
        };
        self.record(&actor.login_name, user_id, kind);
        info!(user_id = %user_id, actor = %actor.login_name, active, "account activation changed");
        Ok(())
    }

    async fn insert(
        &self,
        actor: &str,
        login_name: &str,
        password: &str,
        roles: Vec<Role>,
    ) -> Result<CurrentUser, AdminError> {
        let login_name = validate_login_name(login_name)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AdminError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if roles.is_empty() {
            return Err(AdminError::InvalidInput("at least one role is required".into()));
        }

        let hasher = Arc::clone(&self.hasher);
        let plaintext = password.to_owned();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AuthError::internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AuthError::internal(e.to_string()))?;

        let mut roles = roles;
        roles.sort();
        roles.dedup();

        let credential = UserCredential::new(login_name, password_hash, roles);
        let user = credential.to_current_user();

        match bounded(
            "insert_user",
            self.store_timeout,
            self.store.insert_user(credential),
        )
        .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(AdminError::DuplicateLoginName(login_name.to_string()));
            }
            Err(e) => return Err(store_failure("insert_user", e).into()),
        }

        self.record(actor, user.user_id, AuditKind::AccountProvisioned);
        info!(user_id = %user.user_id, actor, "account provisioned");
        Ok(user)
    }

    fn record(&self, actor: &str, subject: UserId, kind: AuditKind) {
        self.audit.emit(
            AuditEvent::new(actor, kind, AuditOutcome::Success, self.clock.now()).subject(subject),
        );
    }
}

fn validate_login_name(raw: &str) -> Result<&str, AdminError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AdminError::InvalidInput("login name must not be empty".into()));
    }
    if name.chars().count() > MAX_LOGIN_NAME_LEN {
        return Err(AdminError::InvalidInput(format!(
            "login name must be at most {MAX_LOGIN_NAME_LEN} characters"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AdminError::InvalidInput(
            "login name must not contain whitespace".into(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_names_are_trimmed_and_checked() {
        assert_eq!(validate_login_name("  nurse001 ").unwrap(), "nurse001");
        assert!(validate_login_name("   ").is_err());
        assert!(validate_login_name("ward 7").is_err());
        assert!(validate_login_name(&"x".repeat(MAX_LOGIN_NAME_LEN + 1)).is_err());
    }
}
