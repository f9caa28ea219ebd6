use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use nursegate_api::app::{self, services};
use nursegate_infra::AuthConfig;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nursegate_observability::init();

    let config = AuthConfig::from_env().context("invalid NURSEGATE_* configuration")?;
    if !config.cookie_secure {
        tracing::warn!("session cookie is not marked Secure; only use this behind plain HTTP in development");
    }

    let services = services::build_services(config)
        .await
        .context("failed to initialise services")?;
    services::bootstrap_admin_from_env(&services)
        .await
        .context("failed to provision bootstrap admin")?;

    let app = app::build_app(Arc::new(services));

    let bind = std::env::var("NURSEGATE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
