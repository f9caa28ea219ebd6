use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use nursegate_auth::{AuthDecision, AuthError};
use nursegate_infra::AdminError;

pub fn auth_error_to_response(err: &AuthError) -> axum::response::Response {
    let status = match err {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::AccountDisabled => StatusCode::FORBIDDEN,
        AuthError::AccountLocked => StatusCode::LOCKED,
        AuthError::SessionExpired | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Expired sessions look exactly like missing ones; internal details stay in the logs.
    let (code, message) = match err {
        AuthError::SessionExpired => ("unauthenticated", AuthError::Unauthenticated.to_string()),
        AuthError::Internal(_) => (err.code(), "internal error".to_string()),
        _ => (err.code(), err.to_string()),
    };

    json_error(status, code, message)
}

pub fn admin_error_to_response(err: AdminError) -> axum::response::Response {
    match err {
        AdminError::Auth(e) => auth_error_to_response(&e),
        AdminError::UnknownUser(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("unknown user {id}"))
        }
        AdminError::DuplicateLoginName(name) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("login name '{name}' is already taken"),
        ),
        AdminError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    }
}

pub fn decision_to_response(decision: &AuthDecision) -> axum::response::Response {
    match decision {
        AuthDecision::Allowed(_) => StatusCode::OK.into_response(),
        AuthDecision::Unauthenticated => auth_error_to_response(&AuthError::Unauthenticated),
        AuthDecision::Forbidden => auth_error_to_response(&AuthError::Forbidden),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_distinct_statuses() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::AccountDisabled, StatusCode::FORBIDDEN),
            (AuthError::AccountLocked, StatusCode::LOCKED),
            (AuthError::SessionExpired, StatusCode::UNAUTHORIZED),
            (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden, StatusCode::FORBIDDEN),
            (AuthError::internal("pool closed"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(auth_error_to_response(&err).status(), status, "{err:?}");
        }
    }

    #[test]
    fn decisions_map_like_errors() {
        assert_eq!(
            decision_to_response(&AuthDecision::Unauthenticated).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            decision_to_response(&AuthDecision::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
    }
}
