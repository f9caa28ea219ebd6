//! API-side guard in front of protected handlers.
//!
//! Handlers never compare roles themselves; they hand the request's session
//! context to [`require_roles`], which defers to the authorization gate.

use axum::response::Response;

use nursegate_auth::{AuthDecision, CurrentUser, Role, authorize};

use crate::app::errors;
use crate::context::SessionContext;

/// Allow the request if its user holds any of `required` (or, with an empty
/// slice, if it has a user at all).
pub fn require_roles(session: &SessionContext, required: &[Role]) -> Result<CurrentUser, Response> {
    match authorize(session.current_user().cloned(), required) {
        AuthDecision::Allowed(user) => Ok(user),
        denied => Err(errors::decision_to_response(&denied)),
    }
}

pub fn require_authenticated(session: &SessionContext) -> Result<CurrentUser, Response> {
    require_roles(session, &[])
}
