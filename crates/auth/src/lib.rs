//! `nursegate-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it holds the
//! records, the lockout and session policies, password hashing, and the
//! authorization gate. Orchestration against a store lives in `nursegate-infra`.

pub mod authorize;
pub mod credential;
pub mod error;
pub mod lockout;
pub mod password;
pub mod principal;
pub mod roles;
pub mod session;

pub use authorize::{AuthDecision, DecisionKind, authorize};
pub use credential::{ClientMeta, Session, SessionHandle, SessionId, UserCredential};
pub use error::AuthError;
pub use lockout::{FailureState, LOCK_DURATION_HOURS, LockState, LoginLockPolicy, MAX_FAILED_ATTEMPTS};
pub use password::{Argon2PasswordHasher, PasswordHashError, PasswordHasher};
pub use principal::CurrentUser;
pub use roles::{Role, UnknownRole};
pub use session::{DEFAULT_SESSION_WINDOW_MINUTES, SessionIdError, SessionPolicy};
