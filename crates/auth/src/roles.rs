
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for RBAC.
///
/// The set is closed: every role the system knows about is a variant here, so
/// role membership can only ever be compared by the authorization gate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ward staff: nurses and other day-to-day users.
    GeneralUser,
    /// Operates the system: user administration, lock resets.
    SystemAdmin,
    /// Full control, including administrator management.
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::GeneralUser, Role::SystemAdmin, Role::SuperAdmin];

    /// Roles allowed to run account administration.
    pub const ADMINISTRATORS: [Role; 2] = [Role::SystemAdmin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::GeneralUser => "general_user",
            Role::SystemAdmin => "system_admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
