//! Account administration endpoints (system/super admins only).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};

use nursegate_auth::Role;
use nursegate_core::UserId;

use crate::app::dto::{ProvisionUserRequest, SetActiveRequest, UserResponse};
use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", post(provision_user))
        .route("/users/:id/unlock", post(unlock_user))
        .route("/users/:id/active", post(set_user_active))
}

/// POST /admin/users
pub async fn provision_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<ProvisionUserRequest>,
) -> Response {
    let actor = match authz::require_roles(&session, &Role::ADMINISTRATORS) {
        Ok(actor) => actor,
        Err(denied) => return denied,
    };

    match services
        .admin
        .provision_user(Some(actor), &body.login_name, &body.password, body.roles)
        .await
    {
        Ok(user) => (StatusCode::CREATED, Json(UserResponse::from(user))).into_response(),
        Err(err) => errors::admin_error_to_response(err),
    }
}

/// POST /admin/users/:id/unlock
pub async fn unlock_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Response {
    let actor = match authz::require_roles(&session, &Role::ADMINISTRATORS) {
        Ok(actor) => actor,
        Err(denied) => return denied,
    };
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(resp) => return resp,
    };

    match services.admin.unlock_account(Some(actor), user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => errors::admin_error_to_response(err),
    }
}

/// POST /admin/users/:id/active
pub async fn set_user_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<SetActiveRequest>,
) -> Response {
    let actor = match authz::require_roles(&session, &Role::ADMINISTRATORS) {
        Ok(actor) => actor,
        Err(denied) => return denied,
    };
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(resp) => return resp,
    };

    match services
        .admin
        .set_account_active(Some(actor), user_id, body.active)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => errors::admin_error_to_response(err),
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, Response> {
    raw.parse::<UserId>().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "user id must be a UUID")
    })
}
