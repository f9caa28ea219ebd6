use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use nursegate_auth::{FailureState, Session, SessionId, UserCredential};
use nursegate_core::UserId;

use super::{CredentialStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, UserCredential>,
    by_login_name: HashMap<String, UserId>,
    sessions: HashMap<String, Session>,
}

impl Inner {
    fn drop_sessions_of(&mut self, user_id: UserId) -> u64 {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        (before - self.sessions.len()) as u64
    }
}

/// In-memory credential store.
///
/// Intended for tests/dev. A single lock guards users and sessions together, so
/// every trait method is atomic.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    /// Sessions currently held by `user_id` (inspection helper).
    pub fn sessions_for_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    pub fn session_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.sessions.len())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_login_name(
        &self,
        login_name: &str,
    ) -> Result<Option<UserCredential>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .by_login_name
            .get(login_name)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<UserCredential>, StoreError> {
        Ok(self.read()?.users.get(&user_id).cloned())
    }

    async fn insert_user(&self, user: UserCredential) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.by_login_name.contains_key(&user.login_name) {
            return Err(StoreError::Conflict(format!(
                "login name '{}' already exists",
                user.login_name
            )));
        }
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        inner.by_login_name.insert(user.login_name.clone(), user.id);
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn update_failure_state(
        &self,
        user_id: UserId,
        expected_attempts: u32,
        next: FailureState,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.users.get_mut(&user_id) {
            Some(user) if user.failed_login_attempts == expected_attempts => {
                user.failed_login_attempts = next.attempts;
                user.locked_until = next.locked_until;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_failure_state(
        &self,
        user_id: UserId,
        expected_attempts: u32,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.users.get_mut(&user_id) {
            Some(user) if user.failed_login_attempts == expected_attempts => {
                user.failed_login_attempts = 0;
                user.locked_until = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_active(&self, user_id: UserId, active: bool) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        user.is_active = active;
        if !active {
            inner.drop_sessions_of(user_id);
        }
        Ok(true)
    }

    async fn unlock(&self, user_id: UserId) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        user.failed_login_attempts = 0;
        user.locked_until = None;
        inner.drop_sessions_of(user_id);
        Ok(true)
    }

    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.sessions.contains_key(session.id.as_str()) {
            return Err(StoreError::Conflict("session id collision".to_string()));
        }
        inner.sessions.insert(session.id.as_str().to_string(), session);
        Ok(())
    }

    async fn replace_sessions_for_user(&self, session: Session) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        let active = inner
            .users
            .get(&session.user_id)
            .is_some_and(|u| u.is_active);
        if !active {
            return Ok(false);
        }
        if inner.sessions.contains_key(session.id.as_str()) {
            return Err(StoreError::Conflict("session id collision".to_string()));
        }
        inner.drop_sessions_of(session.user_id);
        inner.sessions.insert(session.id.as_str().to_string(), session);
        Ok(true)
    }

    async fn delete_sessions_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        Ok(self.write()?.drop_sessions_of(user_id))
    }

    async fn find_session_by_id(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.read()?.sessions.get(id.as_str()).cloned())
    }

    async fn renew_session(
        &self,
        id: &SessionId,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.sessions.get_mut(id.as_str()) {
            Some(session) => {
                session.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_session(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.write()?.sessions.remove(id.as_str()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nursegate_auth::{ClientMeta, Role};

    fn nurse() -> UserCredential {
        UserCredential::new("nurse001", "$argon2id$stub", vec![Role::GeneralUser])
    }

    fn session_for(user_id: UserId, token: &str) -> Session {
        let now = Utc::now();
        Session {
            id: SessionId::from_token(token),
            user_id,
            created_at: now,
            expires_at: now + Duration::minutes(30),
            client: ClientMeta::default(),
        }
    }

    #[tokio::test]
    async fn duplicate_login_name_is_a_conflict() {
        let store = InMemoryCredentialStore::new();
        store.insert_user(nurse()).await.unwrap();
        let err = store.insert_user(nurse()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn failure_update_is_compare_and_set() {
        let store = InMemoryCredentialStore::new();
        let user = nurse();
        let id = user.id;
        store.insert_user(user).await.unwrap();

        let next = FailureState { attempts: 1, locked_until: None };
        assert!(store.update_failure_state(id, 0, next).await.unwrap());
        // Stale expectation loses.
        assert!(!store.update_failure_state(id, 0, next).await.unwrap());

        let stored = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 1);
    }

    #[tokio::test]
    async fn clear_is_compare_and_set() {
        let store = InMemoryCredentialStore::new();
        let user = nurse();
        let id = user.id;
        store.insert_user(user).await.unwrap();

        let locked = FailureState {
            attempts: 5,
            locked_until: Some(Utc::now() + Duration::hours(24)),
        };
        assert!(store.update_failure_state(id, 0, locked).await.unwrap());

        // A reset based on the old count must not erase the lock.
        assert!(!store.clear_failure_state(id, 4).await.unwrap());
        let stored = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 5);
        assert!(stored.locked_until.is_some());

        assert!(store.clear_failure_state(id, 5).await.unwrap());
        let stored = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert_eq!(stored.locked_until, None);
    }

    #[tokio::test]
    async fn replace_keeps_exactly_one_session() {
        let store = InMemoryCredentialStore::new();
        let user = nurse();
        let id = user.id;
        store.insert_user(user).await.unwrap();

        store.create_session(session_for(id, "a")).await.unwrap();
        store.create_session(session_for(id, "b")).await.unwrap();
        assert!(store.replace_sessions_for_user(session_for(id, "c")).await.unwrap());

        let sessions = store.sessions_for_user(id).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id.as_str(), "c");
    }

    #[tokio::test]
    async fn replace_refuses_inactive_user() {
        let store = InMemoryCredentialStore::new();
        let mut user = nurse();
        user.is_active = false;
        let id = user.id;
        store.insert_user(user).await.unwrap();

        assert!(!store.replace_sessions_for_user(session_for(id, "x")).await.unwrap());
        assert_eq!(store.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn unlock_resets_counters_and_drops_sessions() {
        let store = InMemoryCredentialStore::new();
        let user = nurse();
        let id = user.id;
        store.insert_user(user).await.unwrap();
        let locked = FailureState {
            attempts: 5,
            locked_until: Some(Utc::now() + Duration::hours(24)),
        };
        store.update_failure_state(id, 0, locked).await.unwrap();
        store.create_session(session_for(id, "s")).await.unwrap();

        assert!(store.unlock(id).await.unwrap());

        let stored = store.find_user_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.locked_until.is_none());
        assert_eq!(store.session_count().unwrap(), 0);
        assert!(!store.unlock(UserId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn deactivation_drops_sessions() {
        let store = InMemoryCredentialStore::new();
        let user = nurse();
        let id = user.id;
        store.insert_user(user).await.unwrap();
        store.create_session(session_for(id, "s")).await.unwrap();

        assert!(store.set_active(id, false).await.unwrap());
        assert_eq!(store.session_count().unwrap(), 0);
        assert!(!store.find_user_by_id(id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn renew_and_delete_report_missing_sessions() {
        let store = InMemoryCredentialStore::new();
        let missing = SessionId::from_token("nope");
        assert!(!store.renew_session(&missing, Utc::now()).await.unwrap());
        assert!(!store.delete_session(&missing).await.unwrap());
    }
}
