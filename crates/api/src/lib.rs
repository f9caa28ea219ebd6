//! HTTP API: session transport, routing, and gate-to-HTTP mapping.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
