//! Session id → current user, with sliding renewal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use nursegate_auth::{CurrentUser, SessionId, SessionPolicy};
use nursegate_core::Clock;

use crate::config::AuthConfig;
use crate::service::bounded;
use crate::store::{CredentialStore, StoreError};

/// A successfully resolved session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub user: CurrentUser,
    /// Expiry after this access's renewal.
    pub expires_at: DateTime<Utc>,
}

/// Turns a presented session id into the current user.
///
/// Never fails: every problem (unknown, expired, store down) resolves to
/// "no user". Expired sessions are deleted on access; there is no sweeper.
pub struct SessionResolver {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    store_timeout: Duration,
    retry_backoff: Duration,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, config: &AuthConfig) -> Self {
        Self {
            store,
            clock,
            policy: config.session_policy(),
            store_timeout: config.store_timeout,
            retry_backoff: config.resolve_retry_backoff,
        }
    }

    pub async fn resolve(&self, session_id: Option<&SessionId>) -> Option<CurrentUser> {
        self.resolve_session(session_id).await.map(|r| r.user)
    }

    /// Like [`resolve`](Self::resolve), also returning the renewed expiry.
    ///
    /// A store failure is retried once after a short backoff; a second failure
    /// is treated as unauthenticated.
    pub async fn resolve_session(&self, session_id: Option<&SessionId>) -> Option<ResolvedSession> {
        let id = session_id?;
        if id.as_str().is_empty() {
            return None;
        }

        match self.try_resolve(id).await {
            Ok(resolved) => resolved,
            Err(first) => {
                warn!(error = %first, "session resolution failed; retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                match self.try_resolve(id).await {
                    Ok(resolved) => resolved,
                    Err(second) => {
                        error!(error = %second, "session resolution failed; treating as unauthenticated");
                        None
                    }
                }
            }
        }
    }

    async fn try_resolve(&self, id: &SessionId) -> Result<Option<ResolvedSession>, StoreError> {
        let now = self.clock.now();
        let limit = self.store_timeout;

        let Some(session) =
            bounded("find_session_by_id", limit, self.store.find_session_by_id(id)).await?
        else {
            return Ok(None);
        };

        if self.policy.is_expired(&session, now) {
            bounded("delete_session", limit, self.store.delete_session(id)).await?;
            debug!(user_id = %session.user_id, "expired session reaped");
            return Ok(None);
        }

        let user = match bounded(
            "find_user_by_id",
            limit,
            self.store.find_user_by_id(session.user_id),
        )
        .await?
        {
            Some(user) if user.is_active => user,
            _ => {
                bounded("delete_session", limit, self.store.delete_session(id)).await?;
                debug!(user_id = %session.user_id, "session of missing or inactive user dropped");
                return Ok(None);
            }
        };

        let expires_at = self.policy.renewed_expiry(&session, now);
        // Gone means a newer login or a logout replaced it meanwhile.
        if !bounded("renew_session", limit, self.store.renew_session(id, expires_at)).await? {
            return Ok(None);
        }

        Ok(Some(ResolvedSession {
            user: user.to_current_user(),
            expires_at,
        }))
    }
}
