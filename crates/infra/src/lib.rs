//! Infrastructure layer: credential storage, audit delivery, configuration,
//! and the services that orchestrate the pure auth policies against them.

pub mod audit;
pub mod config;
pub mod service;
pub mod store;

pub use audit::{
    AuditEvent, AuditKind, AuditOutcome, AuditSink, ChannelAuditSink, InMemoryAuditSink,
    TracingAuditSink, spawn_audit_writer,
};
pub use config::{AuthConfig, ConfigError};
pub use service::{
    AccountAdministration, AdminError, AuthenticationService, ResolvedSession, SessionResolver,
};
pub use store::{CredentialStore, InMemoryCredentialStore, StoreError};
