//! Orchestration of the pure auth policies against a [`CredentialStore`].
//!
//! Every store call goes through [`bounded`], so no operation here can hang on
//! a slow backend: an elapsed deadline becomes [`StoreError::Timeout`].
//!
//! [`CredentialStore`]: crate::store::CredentialStore

use std::future::Future;
use std::time::Duration;

use nursegate_auth::AuthError;

use crate::store::StoreError;

pub mod admin;
pub mod authentication;
pub mod resolver;


pub use admin::{AccountAdministration, AdminError};
pub use authentication::AuthenticationService;
pub use resolver::{ResolvedSession, SessionResolver};

/// Run a store operation under a deadline.
pub(crate) async fn bounded<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(op)),
    }
}

/// Log a store failure and hide it behind `AuthError::Internal`.
pub(crate) fn store_failure(op: &'static str, err: StoreError) -> AuthError {
    tracing::error!(operation = op, error = %err, "credential store failure");
    AuthError::internal(format!("{op}: {err}"))
}
