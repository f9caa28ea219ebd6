//! Postgres-backed credential store.
//!
//! Tables (created by [`PostgresCredentialStore::ensure_schema`]):
//!
//! ```sql
//! CREATE TABLE auth_users (
//!     id                    UUID PRIMARY KEY,
//!     login_name            TEXT NOT NULL UNIQUE,
//!     password_hash         TEXT NOT NULL,
//!     is_active             BOOLEAN NOT NULL DEFAULT TRUE,
//!     failed_login_attempts INTEGER NOT NULL DEFAULT 0 CHECK (failed_login_attempts >= 0),
//!     locked_until          TIMESTAMPTZ NULL,
//!     roles                 TEXT[] NOT NULL DEFAULT '{}'
//! );
//!
//! CREATE TABLE auth_sessions (
//!     id          TEXT PRIMARY KEY,
//!     user_id     UUID NOT NULL REFERENCES auth_users(id) ON DELETE CASCADE,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     expires_at  TIMESTAMPTZ NOT NULL,
//!     client_ip   TEXT NULL,
//!     user_agent  TEXT NULL
//! );
//! ```
//!
//! ## Concurrency
//!
//! | Operation | Mechanism |
//! |---|---|
//! | `update_failure_state`, `clear_failure_state` | `UPDATE ... WHERE failed_login_attempts = $expected` (compare-and-set) |
//! | `replace_sessions_for_user` | transaction holding `SELECT ... FOR UPDATE` on the user row |
//! | `unlock`, `set_active` | single transaction over user row + sessions |
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |---|---|
//! | Database `23505` (unique violation) | `Conflict` |
//! | `PoolTimedOut`, `PoolClosed`, `Io` | `Unavailable` |
//! | anything else | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use nursegate_auth::{ClientMeta, FailureState, Role, Session, SessionId, UserCredential};
use nursegate_core::UserId;

use super::{CredentialStore, StoreError};

const USER_COLUMNS: &str =
    "id, login_name, password_hash, is_active, failed_login_attempts, locked_until, roles";

const SESSION_COLUMNS: &str = "id, user_id, created_at, expires_at, client_ip, user_agent";

/// Postgres-backed credential store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and shareable.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables and indexes if they don't exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_users (
                id                    UUID PRIMARY KEY,
                login_name            TEXT NOT NULL UNIQUE,
                password_hash         TEXT NOT NULL,
                is_active             BOOLEAN NOT NULL DEFAULT TRUE,
                failed_login_attempts INTEGER NOT NULL DEFAULT 0 CHECK (failed_login_attempts >= 0),
                locked_until          TIMESTAMPTZ NULL,
                roles                 TEXT[] NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_sessions (
                id          TEXT PRIMARY KEY,
                user_id     UUID NOT NULL REFERENCES auth_users(id) ON DELETE CASCADE,
                created_at  TIMESTAMPTZ NOT NULL,
                expires_at  TIMESTAMPTZ NOT NULL,
                client_ip   TEXT NULL,
                user_agent  TEXT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS auth_sessions_user_id_idx ON auth_sessions (user_id)")
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(())
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().is_some_and(|c| c.as_ref() == "23505") => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn attempts_to_db(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

fn user_from_row(row: &PgRow) -> Result<UserCredential, StoreError> {
    let id: Uuid = row.try_get("id").map_err(map_sqlx)?;
    let attempts: i32 = row.try_get("failed_login_attempts").map_err(map_sqlx)?;
    let raw_roles: Vec<String> = row.try_get("roles").map_err(map_sqlx)?;

    let roles = raw_roles
        .iter()
        .filter_map(|r| match r.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(user_id = %id, error = %e, "ignoring unknown role");
                None
            }
        })
        .collect();

    Ok(UserCredential {
        id: UserId::from_uuid(id),
        login_name: row.try_get("login_name").map_err(map_sqlx)?,
        password_hash: row.try_get("password_hash").map_err(map_sqlx)?,
        is_active: row.try_get("is_active").map_err(map_sqlx)?,
        failed_login_attempts: u32::try_from(attempts).unwrap_or(0),
        locked_until: row.try_get("locked_until").map_err(map_sqlx)?,
        roles,
    })
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    let id: String = row.try_get("id").map_err(map_sqlx)?;
    let user_id: Uuid = row.try_get("user_id").map_err(map_sqlx)?;
    Ok(Session {
        id: SessionId::from_token(id),
        user_id: UserId::from_uuid(user_id),
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
        expires_at: row.try_get("expires_at").map_err(map_sqlx)?,
        client: ClientMeta::new(
            row.try_get("client_ip").map_err(map_sqlx)?,
            row.try_get("user_agent").map_err(map_sqlx)?,
        ),
    })
}

async fn insert_session<'e, E>(executor: E, session: &Session) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO auth_sessions (id, user_id, created_at, expires_at, client_ip, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(session.id.as_str())
    .bind(session.user_id.as_uuid())
    .bind(session.created_at)
    .bind(session.expires_at)
    .bind(session.client.ip.as_deref())
    .bind(session.client.user_agent.as_deref())
    .execute(executor)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self))]
    async fn find_user_by_login_name(
        &self,
        login_name: &str,
    ) -> Result<Option<UserCredential>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM auth_users WHERE login_name = $1"
        ))
        .bind(login_name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<UserCredential>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM auth_users WHERE id = $1"))
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: UserCredential) -> Result<(), StoreError> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO auth_users
                (id, login_name, password_hash, is_active, failed_login_attempts, locked_until, roles)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.login_name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(attempts_to_db(user.failed_login_attempts))
        .bind(user.locked_until)
        .bind(roles)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_failure_state(
        &self,
        user_id: UserId,
        expected_attempts: u32,
        next: FailureState,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auth_users
               SET failed_login_attempts = $3,
                   locked_until = $4
             WHERE id = $1
               AND failed_login_attempts = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(attempts_to_db(expected_attempts))
        .bind(attempts_to_db(next.attempts))
        .bind(next.locked_until)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn clear_failure_state(
        &self,
        user_id: UserId,
        expected_attempts: u32,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auth_users
               SET failed_login_attempts = 0,
                   locked_until = NULL
             WHERE id = $1
               AND failed_login_attempts = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(attempts_to_db(expected_attempts))
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn set_active(&self, user_id: UserId, active: bool) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let updated = sqlx::query("UPDATE auth_users SET is_active = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(active)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(false);
        }

        if !active {
            sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn unlock(&self, user_id: UserId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let updated = sqlx::query(
            "UPDATE auth_users SET failed_login_attempts = 0, locked_until = NULL WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        insert_session(&*self.pool, &session).await
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn replace_sessions_for_user(&self, session: Session) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // Row lock serialises concurrent logins (and deactivation) for this user.
        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM auth_users WHERE id = $1 FOR UPDATE")
                .bind(session.user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx)?;

        if active != Some(true) {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(session.user_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        insert_session(&mut *tx, &session).await?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn delete_sessions_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    #[instrument(skip_all)]
    async fn find_session_by_id(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx)?;

        row.as_ref().map(session_from_row).transpose()
    }

    #[instrument(skip_all)]
    async fn renew_session(
        &self,
        id: &SessionId,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE auth_sessions SET expires_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(expires_at)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip_all)]
    async fn delete_session(&self, id: &SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }
}
