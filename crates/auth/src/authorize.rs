
use std::collections::HashSet;

use serde::Serialize;

use crate::{AuthError, CurrentUser, Role};

/// Outcome of the authorization gate.
///
/// Three-way on purpose: callers redirect to login on `Unauthenticated` and
/// show an access-denied page on `Forbidden`.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed(CurrentUser),
    Unauthenticated,
    Forbidden,
}

impl AuthDecision {
    /// Convert into a `Result`, keeping the failure kind.
    pub fn into_result(self) -> Result<CurrentUser, AuthError> {
        match self {
            AuthDecision::Allowed(user) => Ok(user),
            AuthDecision::Unauthenticated => Err(AuthError::Unauthenticated),
            AuthDecision::Forbidden => Err(AuthError::Forbidden),
        }
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            AuthDecision::Allowed(_) => DecisionKind::Allowed,
            AuthDecision::Unauthenticated => DecisionKind::Unauthenticated,
            AuthDecision::Forbidden => DecisionKind::Forbidden,
        }
    }
}

/// Payload-free decision tag (for logs and audit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Allowed,
    Unauthenticated,
    Forbidden,
}

/// The authorization gate.
///
/// - No current user: `Unauthenticated`.
/// - `required` empty: any authenticated user is allowed.
/// - Otherwise the user must hold **at least one** of `required` (any-of).
///
/// This is the only place role membership is compared.
pub fn authorize(current: Option<CurrentUser>, required: &[Role]) -> AuthDecision {
    let Some(user) = current else {
        return AuthDecision::Unauthenticated;
    };

    if required.is_empty() {
        return AuthDecision::Allowed(user);
    }

    let held: HashSet<Role> = user.roles().iter().copied().collect();
    if required.iter().any(|r| held.contains(r)) {
        AuthDecision::Allowed(user)
    } else {
        tracing::debug!(
            user_id = %user.user_id,
            required = ?required,
            held = ?user.roles(),
            "authorization denied"
        );
        AuthDecision::Forbidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nursegate_core::UserId;
    use proptest::prelude::*;

    fn user(roles: Vec<Role>) -> CurrentUser {
        CurrentUser::new(UserId::new(), "nurse001", roles)
    }

    #[test]
    fn no_user_is_unauthenticated() {
        assert_eq!(authorize(None, &[Role::GeneralUser]), AuthDecision::Unauthenticated);
        assert_eq!(authorize(None, &[]), AuthDecision::Unauthenticated);
    }

    #[test]
    fn disjoint_roles_are_forbidden() {
        let decision = authorize(Some(user(vec![Role::GeneralUser])), &[Role::SystemAdmin]);
        assert_eq!(decision, AuthDecision::Forbidden);
    }

    #[test]
    fn empty_requirement_allows_any_authenticated_user() {
        let u = user(vec![Role::GeneralUser]);
        assert_eq!(authorize(Some(u.clone()), &[]), AuthDecision::Allowed(u));
    }

    #[test]
    fn user_without_roles_only_passes_open_gates() {
        let u = user(vec![]);
        assert_eq!(authorize(Some(u.clone()), &[Role::GeneralUser]), AuthDecision::Forbidden);
        assert_eq!(authorize(Some(u.clone()), &[]), AuthDecision::Allowed(u));
    }

    #[test]
    fn any_of_semantics() {
        let u = user(vec![Role::SuperAdmin]);
        let decision = authorize(Some(u.clone()), &Role::ADMINISTRATORS);
        assert_eq!(decision, AuthDecision::Allowed(u));
    }

    #[test]
    fn into_result_keeps_failure_kind() {
        assert_eq!(
            authorize(None, &[]).into_result(),
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(
            authorize(Some(user(vec![])), &[Role::SuperAdmin]).into_result(),
            Err(AuthError::Forbidden)
        );
    }

    fn role_set() -> impl Strategy<Value = Vec<Role>> {
        prop::collection::vec(prop::sample::select(Role::ALL.to_vec()), 0..4)
    }

    proptest! {
        /// Property: the decision is Allowed iff required is empty or the two
        /// role sets intersect.
        #[test]
        fn gate_matches_set_intersection(held in role_set(), required in role_set()) {
            let decision = authorize(Some(user(held.clone())), &required);
            let intersects = required.iter().any(|r| held.contains(r));
            if required.is_empty() || intersects {
                prop_assert_eq!(decision.kind(), DecisionKind::Allowed);
            } else {
                prop_assert_eq!(decision.kind(), DecisionKind::Forbidden);
            }
        }
    }
}
