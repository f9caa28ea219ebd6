use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nursegate_auth::{CurrentUser, Role, SessionHandle};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login_name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub login_name: String,
    pub roles: Vec<Role>,
}

impl From<CurrentUser> for UserResponse {
    fn from(user: CurrentUser) -> Self {
        Self {
            user_id: user.user_id.to_string(),
            login_name: user.login_name,
            roles: user.roles,
        }
    }
}

/// Login result. The token is also set as an `HttpOnly` cookie; the body copy
/// is for clients that send it as a bearer token.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<SessionHandle> for LoginResponse {
    fn from(handle: SessionHandle) -> Self {
        Self {
            user: handle.user.into(),
            session_token: handle.session_id.into_inner(),
            expires_at: handle.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProvisionUserRequest {
    pub login_name: String,
    pub password: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}
