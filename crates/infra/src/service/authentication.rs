//! Login and logout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use nursegate_auth::{
    AuthError, ClientMeta, LoginLockPolicy, PasswordHasher, SessionHandle, SessionId,
    SessionPolicy, UserCredential,
};
use nursegate_core::Clock;

use crate::audit::{AuditEvent, AuditKind, AuditOutcome, AuditSink};
use crate::config::AuthConfig;
use crate::service::{bounded, store_failure};
use crate::store::CredentialStore;

/// Verifies credentials and issues sessions.
///
/// Login is never retried on a store failure: a silently repeated attempt
/// could consume lockout budget twice or mask a lock.
pub struct AuthenticationService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    lock_policy: LoginLockPolicy,
    session_policy: SessionPolicy,
    store_timeout: Duration,
    failure_update_retries: u32,
}

impl AuthenticationService {
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
            lock_policy: config.lock_policy(),
            session_policy: config.session_policy(),
            store_timeout: config.store_timeout,
            failure_update_retries: config.failure_update_retries,
        }
    }

    /// Check a login name and password and, on success, replace every session
    /// of the user with a single fresh one.
    ///
    /// Steps short-circuit in order: unknown user (after a dummy verify),
    /// disabled, locked, wrong password. Failed password checks are persisted
    /// before the error is returned.
    #[instrument(skip_all, fields(login_name = %login_name.trim()))]
    pub async fn authenticate(
        &self,
        login_name: &str,
        password: &str,
        client: ClientMeta,
    ) -> Result<SessionHandle, AuthError> {
        let login_name = login_name.trim();
        let now = self.clock.now();

        let user = if login_name.is_empty() {
            None
        } else {
            bounded(
                "find_user_by_login_name",
                self.store_timeout,
                self.store.find_user_by_login_name(login_name),
            )
            .await
            .map_err(|e| store_failure("find_user_by_login_name", e))?
        };

        let Some(user) = user else {
            // Same hashing cost as a real account.
            self.verify_password(password, None).await?;
            self.emit(login_name, None, AuditKind::LoginFailed, AuditOutcome::Failure, now, &client);
            info!(outcome = "invalid_credentials", "login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            self.emit_for(&user, login_name, AuditKind::LoginRejectedDisabled, now, &client);
            info!(user_id = %user.id, outcome = "account_disabled", "login rejected");
            return Err(AuthError::AccountDisabled);
        }

        let lock = self
            .lock_policy
            .check_lock(user.failed_login_attempts, user.locked_until, now);
        if lock.is_locked() {
            self.emit_for(&user, login_name, AuditKind::LoginRejectedLocked, now, &client);
            info!(user_id = %user.id, outcome = "account_locked", "login rejected");
            return Err(AuthError::AccountLocked);
        }

        if !self
            .verify_password(password, Some(user.password_hash.clone()))
            .await?
        {
            return Err(self.record_failure(&user, login_name, now, &client).await);
        }

        self.reset_failures(&user, login_name, now, &client).await?;

        let session = self
            .session_policy
            .issue(user.id, client.clone(), now)
            .map_err(|e| AuthError::internal(e.to_string()))?;

        let replaced = bounded(
            "replace_sessions_for_user",
            self.store_timeout,
            self.store.replace_sessions_for_user(session.clone()),
        )
        .await
        .map_err(|e| store_failure("replace_sessions_for_user", e))?;

        if !replaced {
            // Deactivated between the read and the write.
            self.emit_for(&user, login_name, AuditKind::LoginRejectedDisabled, now, &client);
            info!(user_id = %user.id, outcome = "account_disabled", "login rejected");
            return Err(AuthError::AccountDisabled);
        }

        self.audit.emit(
            AuditEvent::new(login_name, AuditKind::LoginSucceeded, AuditOutcome::Success, now)
                .subject(user.id)
                .client_ip(client.ip.clone()),
        );
        info!(user_id = %user.id, outcome = "success", "login succeeded");

        Ok(SessionHandle {
            session_id: session.id,
            user: user.to_current_user(),
            expires_at: session.expires_at,
        })
    }

    /// Delete a session. Unknown ids are a no-op.
    #[instrument(skip_all)]
    pub async fn logout(&self, session_id: &SessionId) -> Result<(), AuthError> {
        let now = self.clock.now();

        let session = bounded(
            "find_session_by_id",
            self.store_timeout,
            self.store.find_session_by_id(session_id),
        )
        .await
        .map_err(|e| store_failure("find_session_by_id", e))?;

        let Some(session) = session else {
            return Ok(());
        };

        bounded(
            "delete_session",
            self.store_timeout,
            self.store.delete_session(session_id),
        )
        .await
        .map_err(|e| store_failure("delete_session", e))?;

        self.audit.emit(
            AuditEvent::new(
                session.user_id.to_string(),
                AuditKind::Logout,
                AuditOutcome::Success,
                now,
            )
            .subject(session.user_id)
            .client_ip(session.client.ip.clone()),
        );
        info!(user_id = %session.user_id, "logged out");
        Ok(())
    }

    /// Persist one more failure with a compare-and-set on the counter.
    ///
    /// A lost race re-reads the row and re-applies the policy, so concurrent
    /// wrong passwords each consume exactly one attempt.
    async fn record_failure(
        &self,
        user: &UserCredential,
        login_name: &str,
        now: DateTime<Utc>,
        client: &ClientMeta,
    ) -> AuthError {
        let mut observed = user.failed_login_attempts;

        for _ in 0..=self.failure_update_retries {
            let next = self.lock_policy.on_failure(observed, now);

            let written = match bounded(
                "update_failure_state",
                self.store_timeout,
                self.store.update_failure_state(user.id, observed, next),
            )
            .await
            {
                Ok(written) => written,
                Err(e) => return store_failure("update_failure_state", e),
            };

            if written {
                if next.is_locked() {
                    self.emit_for(user, login_name, AuditKind::AccountLocked, now, client);
                    warn!(
                        user_id = %user.id,
                        attempts = next.attempts,
                        outcome = "account_locked",
                        "account locked after repeated failures"
                    );
                    return AuthError::AccountLocked;
                }
                self.emit_for(user, login_name, AuditKind::LoginFailed, now, client);
                info!(
                    user_id = %user.id,
                    attempts = next.attempts,
                    outcome = "invalid_credentials",
                    "login rejected"
                );
                return AuthError::InvalidCredentials;
            }

            let current = match bounded(
                "find_user_by_id",
                self.store_timeout,
                self.store.find_user_by_id(user.id),
            )
            .await
            {
                Ok(Some(current)) => current,
                Ok(None) => return AuthError::InvalidCredentials,
                Err(e) => return store_failure("find_user_by_id", e),
            };

            let lock = self
                .lock_policy
                .check_lock(current.failed_login_attempts, current.locked_until, now);
            if lock.is_locked() {
                self.emit_for(user, login_name, AuditKind::LoginRejectedLocked, now, client);
                return AuthError::AccountLocked;
            }
            observed = current.failed_login_attempts;
        }

        warn!(user_id = %user.id, "gave up updating failure counter under contention");
        AuthError::internal("failure counter contention")
    }

    /// Reset the counter after a correct password, with the same
    /// compare-and-set as [`Self::record_failure`].
    ///
    /// A failure that lands between the lock check and the reset moves the
    /// counter; the row is re-read and a lock it produced wins over the login.
    async fn reset_failures(
        &self,
        user: &UserCredential,
        login_name: &str,
        now: DateTime<Utc>,
        client: &ClientMeta,
    ) -> Result<(), AuthError> {
        let mut observed = user.failed_login_attempts;

        for _ in 0..=self.failure_update_retries {
            let cleared = bounded(
                "clear_failure_state",
                self.store_timeout,
                self.store.clear_failure_state(user.id, observed),
            )
            .await
            .map_err(|e| store_failure("clear_failure_state", e))?;
            if cleared {
                return Ok(());
            }

            let current = bounded(
                "find_user_by_id",
                self.store_timeout,
                self.store.find_user_by_id(user.id),
            )
            .await
            .map_err(|e| store_failure("find_user_by_id", e))?
            .ok_or(AuthError::InvalidCredentials)?;

            let lock = self
                .lock_policy
                .check_lock(current.failed_login_attempts, current.locked_until, now);
            if lock.is_locked() {
                self.emit_for(user, login_name, AuditKind::LoginRejectedLocked, now, client);
                info!(user_id = %user.id, outcome = "account_locked", "login rejected");
                return Err(AuthError::AccountLocked);
            }
            observed = current.failed_login_attempts;
        }

        warn!(user_id = %user.id, "gave up resetting failure counter under contention");
        Err(AuthError::internal("failure counter contention"))
    }

    /// Hash verification runs on the blocking pool; Argon2 is deliberately slow.
    async fn verify_password(&self, password: &str, stored: Option<String>) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify(&password, hasher.dummy_hash()),
        })
        .await
        .map_err(|e| AuthError::internal(format!("password verification task failed: {e}")))
    }

    fn emit_for(
        &self,
        user: &UserCredential,
        login_name: &str,
        kind: AuditKind,
        now: DateTime<Utc>,
        client: &ClientMeta,
    ) {
        self.emit(login_name, Some(user), kind, AuditOutcome::Failure, now, client);
    }

    fn emit(
        &self,
        login_name: &str,
        user: Option<&UserCredential>,
        kind: AuditKind,
        outcome: AuditOutcome,
        now: DateTime<Utc>,
        client: &ClientMeta,
    ) {
        let mut event =
            AuditEvent::new(login_name, kind, outcome, now).client_ip(client.ip.clone());
        if let Some(user) = user {
            event = event.subject(user.id);
        }
        self.audit.emit(event);
    }
}
