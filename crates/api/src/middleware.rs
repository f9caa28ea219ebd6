//! Session resolution for every request.
//!
//! The middleware never rejects: it attaches a [`SessionContext`] and leaves
//! the allow/deny decision to the handlers through [`crate::authz`].

use std::sync::Arc;

use axum::{
    extract::State,
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};

use nursegate_auth::SessionId;
use nursegate_infra::{AuthConfig, SessionResolver};

use crate::context::{PresentedToken, SessionContext, TokenSource};

#[derive(Clone)]
pub struct SessionState {
    pub resolver: Arc<SessionResolver>,
    pub config: Arc<AuthConfig>,
}

pub async fn session_middleware(
    State(state): State<SessionState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = extract_session_token(req.headers(), &state.config.cookie_name);

    let resolved = state
        .resolver
        .resolve_session(token.as_ref().map(|t| &t.session_id))
        .await;

    let refresh = match (&token, &resolved) {
        (Some(t), Some(_)) if t.source == TokenSource::Cookie => Some(t.session_id.clone()),
        _ => None,
    };

    req.extensions_mut()
        .insert(SessionContext::new(token, resolved.map(|r| r.user)));

    let mut response = next.run(req).await;

    // Login and logout set their own cookie; don't overwrite it.
    if let Some(session_id) = refresh {
        if !response.headers().contains_key(SET_COOKIE) {
            if let Ok(cookie) = session_cookie(&state.config, &session_id) {
                response.headers_mut().insert(SET_COOKIE, cookie);
            }
        }
    }

    response
}

/// `Set-Cookie` value carrying the session token for one idle window.
pub fn session_cookie(
    config: &AuthConfig,
    session_id: &SessionId,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.session_window.as_secs();
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}",
        config.cookie_name,
        session_id.as_str()
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        config.cookie_name
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Bearer header first, then the session cookie.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<PresentedToken> {
    if let Some(token) = extract_bearer(headers) {
        return Some(PresentedToken {
            session_id: SessionId::from_token(token),
            source: TokenSource::Bearer,
        });
    }

    extract_cookie(headers, cookie_name).map(|token| PresentedToken {
        session_id: SessionId::from_token(token),
        source: TokenSource::Cookie,
    })
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    // Auth schemes are case-insensitive.
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

fn extract_cookie<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == cookie_name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
