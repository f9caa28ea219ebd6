//! Service wiring: store selection, audit sink, bootstrap account.

use std::sync::Arc;

use nursegate_auth::{Argon2PasswordHasher, PasswordHasher};
use nursegate_core::{Clock, SystemClock};
use nursegate_infra::{
    AccountAdministration, AuditSink, AuthConfig, AuthenticationService, CredentialStore,
    InMemoryCredentialStore, SessionResolver, TracingAuditSink,
};

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub config: Arc<AuthConfig>,
    pub auth: AuthenticationService,
    pub resolver: Arc<SessionResolver>,
    pub admin: AccountAdministration,
}

impl AppServices {
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = AuthenticationService::new(
            store.clone(),
            hasher.clone(),
            audit.clone(),
            clock.clone(),
            &config,
        );
        let resolver = Arc::new(SessionResolver::new(store.clone(), clock.clone(), &config));
        let admin = AccountAdministration::new(store, hasher, audit, clock, &config);

        Self {
            config: Arc::new(config),
            auth,
            resolver,
            admin,
        }
    }
}

/// In-memory wiring (dev/test): in-memory store, tracing audit, system clock.
pub fn build_in_memory_services(config: AuthConfig) -> anyhow::Result<AppServices> {
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2PasswordHasher::new()?);
    Ok(AppServices::new(
        config,
        InMemoryCredentialStore::arc(),
        hasher,
        Arc::new(TracingAuditSink),
        Arc::new(SystemClock),
    ))
}

/// Postgres-backed wiring.
#[cfg(feature = "postgres")]
pub async fn build_postgres_services(
    config: AuthConfig,
    database_url: &str,
) -> anyhow::Result<AppServices> {
    use nursegate_infra::store::PostgresCredentialStore;
    use sqlx::postgres::PgPoolOptions;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.store_timeout)
        .connect(database_url)
        .await?;
    let store = Arc::new(PostgresCredentialStore::new(pool));
    store.ensure_schema().await?;

    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2PasswordHasher::new()?);
    Ok(AppServices::new(
        config,
        store,
        hasher,
        Arc::new(TracingAuditSink),
        Arc::new(SystemClock),
    ))
}

/// Pick the store from the environment: Postgres when `DATABASE_URL` is set
/// and the `postgres` feature is compiled in, otherwise in-memory.
pub async fn build_services(config: AuthConfig) -> anyhow::Result<AppServices> {
    #[cfg(feature = "postgres")]
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        tracing::info!("using postgres credential store");
        return build_postgres_services(config, &database_url).await;
    }

    if std::env::var("DATABASE_URL").is_ok() {
        tracing::warn!("DATABASE_URL is set but postgres support is not compiled in; using in-memory store");
    } else {
        tracing::info!("using in-memory credential store");
    }
    build_in_memory_services(config)
}

/// Provision the start-up super admin if both variables are set.
pub async fn bootstrap_admin_from_env(services: &AppServices) -> anyhow::Result<()> {
    let (Ok(login_name), Ok(password)) = (
        std::env::var("NURSEGATE_BOOTSTRAP_ADMIN"),
        std::env::var("NURSEGATE_BOOTSTRAP_PASSWORD"),
    ) else {
        return Ok(());
    };

    match services
        .admin
        .bootstrap_super_admin(&login_name, &password)
        .await?
    {
        Some(user) => tracing::info!(user_id = %user.user_id, "bootstrap admin provisioned"),
        None => tracing::info!("bootstrap admin already exists"),
    }
    Ok(())
}
