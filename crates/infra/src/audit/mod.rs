//! Audit trail for authentication events.
//!
//! The core hands events to an [`AuditSink`] and moves on: `emit` returns
//! nothing, must not block, and a failing sink never fails the operation that
//! produced the event.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use nursegate_core::UserId;

pub mod channel;

pub use channel::{ChannelAuditSink, spawn_audit_writer};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    LoginSucceeded,
    LoginFailed,
    /// The failure that tripped the lock.
    AccountLocked,
    /// A login refused because the account was already locked.
    LoginRejectedLocked,
    LoginRejectedDisabled,
    Logout,
    AccountUnlocked,
    AccountActivated,
    AccountDeactivated,
    AccountProvisioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// One audit record.
///
/// `actor` is the login name as submitted (for logins) or the administrator's
/// login name (for admin operations). `subject` is the affected account when
/// known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub actor: String,
    pub subject: Option<UserId>,
    pub kind: AuditKind,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
    pub client_ip: Option<String>,
}

impl AuditEvent {
    pub fn new(
        actor: impl Into<String>,
        kind: AuditKind,
        outcome: AuditOutcome,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            actor: actor.into(),
            subject: None,
            kind,
            outcome,
            timestamp,
            client_ip: None,
        }
    }

    pub fn subject(mut self, user_id: UserId) -> Self {
        self.subject = Some(user_id);
        self
    }

    pub fn client_ip(mut self, ip: Option<String>) -> Self {
        self.client_ip = ip;
        self
    }
}

/// Fire-and-forget audit destination.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Writes each event as one JSON log line on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "audit", event = %json),
            Err(e) => tracing::warn!(target: "audit", error = %e, "failed to serialise audit event"),
        }
    }
}

/// Collects events in memory (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<AuditKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialises_with_snake_case_tags() {
        let event = AuditEvent::new(
            "nurse001",
            AuditKind::LoginRejectedLocked,
            AuditOutcome::Failure,
            Utc::now(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "login_rejected_locked");
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["actor"], "nurse001");
    }

    #[test]
    fn in_memory_sink_records_in_order() {
        let sink = InMemoryAuditSink::new();
        let now = Utc::now();
        sink.emit(AuditEvent::new("a", AuditKind::LoginFailed, AuditOutcome::Failure, now));
        sink.emit(AuditEvent::new("a", AuditKind::LoginSucceeded, AuditOutcome::Success, now));
        assert_eq!(sink.kinds(), vec![AuditKind::LoginFailed, AuditKind::LoginSucceeded]);
    }
}
