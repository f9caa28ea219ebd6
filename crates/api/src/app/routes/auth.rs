//! Login, logout, and "who am I".

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, Extension},
    http::{
        HeaderMap, StatusCode,
        header::{SET_COOKIE, USER_AGENT},
    },
    response::{IntoResponse, Response},
};
use tracing::error;

use nursegate_auth::ClientMeta;

use crate::app::dto::{LoginRequest, LoginResponse, UserResponse};
use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::SessionContext;
use crate::middleware::{clear_session_cookie, session_cookie};

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Response {
    let client = client_meta(&headers, connect_info);

    let handle = match services
        .auth
        .authenticate(&body.login_name, &body.password, client)
        .await
    {
        Ok(handle) => handle,
        Err(err) => return errors::auth_error_to_response(&err),
    };

    let mut response_headers = HeaderMap::new();
    match session_cookie(&services.config, &handle.session_id) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            );
        }
    }

    (
        StatusCode::OK,
        response_headers,
        Json(LoginResponse::from(handle)),
    )
        .into_response()
}

/// POST /auth/logout
///
/// Always clears the cookie; a missing or unknown session is not an error.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> Response {
    if let Some(token) = session.token() {
        if let Err(err) = services.auth.logout(&token.session_id).await {
            return errors::auth_error_to_response(&err);
        }
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&services.config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// GET /auth/me
pub async fn me(Extension(session): Extension<SessionContext>) -> Response {
    match authz::require_authenticated(&session) {
        Ok(user) => (StatusCode::OK, Json(UserResponse::from(user))).into_response(),
        Err(denied) => denied,
    }
}

fn client_meta(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> ClientMeta {
    let ip = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.chars().take(256).collect());
    ClientMeta::new(ip, user_agent)
}
