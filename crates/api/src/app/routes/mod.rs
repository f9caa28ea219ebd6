use axum::{
    Router,
    routing::{get, post},
};

pub mod admin;
pub mod auth;
pub mod system;

/// Router for every endpoint that sees the session context.
pub fn router() -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .nest("/admin", admin::router())
}
