//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/hasher/audit wiring behind `AppServices`
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Everything except `/health` runs behind the session middleware.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let session_state = middleware::SessionState {
        resolver: services.resolver.clone(),
        config: services.config.clone(),
    };

    let with_sessions = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                session_state,
                middleware::session_middleware,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(with_sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use nursegate_auth::Argon2PasswordHasher;
    use nursegate_core::SystemClock;
    use nursegate_infra::{AuthConfig, InMemoryAuditSink, InMemoryCredentialStore};
    use tower::ServiceExt;

    fn app() -> Router {
        let services = AppServices::new(
            AuthConfig::default(),
            InMemoryCredentialStore::arc(),
            Arc::new(Argon2PasswordHasher::with_params(8, 1, 1).unwrap()),
            Arc::new(InMemoryAuditSink::new()),
            Arc::new(SystemClock),
        );
        build_app(Arc::new(services))
    }

    #[tokio::test]
    async fn health_needs_no_session() {
        let res = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn me_without_session_is_unauthenticated() {
        let res = app()
            .oneshot(Request::get("/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_bearer_token_is_unauthenticated() {
        let res = app()
            .oneshot(
                Request::get("/auth/me")
                    .header("authorization", "Bearer made-up")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
