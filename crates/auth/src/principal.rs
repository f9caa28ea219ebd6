
use serde::{Deserialize, Serialize};

use nursegate_core::UserId;

use crate::Role;

/// The authenticated user attached to a request.
///
/// Produced only by a successful login or a successful session resolution;
/// authorization decisions are taken on this object, never on raw store rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub login_name: String,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    pub fn new(user_id: UserId, login_name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            login_name: login_name.into(),
            roles,
        }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
