//! Failure kinds surfaced by the authentication core.

use thiserror::Error;

/// Typed authentication/authorization failure.
///
/// `InvalidCredentials` covers both "unknown user" and "wrong password"; the
/// two are deliberately indistinguishable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account disabled")]
    AccountDisabled,

    #[error("account locked")]
    AccountLocked,

    /// Surfaced to users as "no session".
    #[error("session expired")]
    SessionExpired,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    /// Store unavailable, timeout, hashing failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::AccountLocked => "account_locked",
            AuthError::SessionExpired => "session_expired",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden => "forbidden",
            AuthError::Internal(_) => "internal_error",
        }
    }
}
