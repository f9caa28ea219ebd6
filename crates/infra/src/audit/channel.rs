//! Bounded, lossy audit delivery to a byte sink.
//!
//! `emit` uses `try_send`: when the writer falls behind or has died, events are
//! dropped (and counted) rather than applying backpressure to logins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{AuditEvent, AuditSink};

#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelAuditSink {
    /// Events discarded because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(target: "audit", error = %e, "audit event dropped");
        }
    }
}

/// Spawn a task that writes events as JSON lines into `writer`.
///
/// Write errors are logged and the event skipped; the task ends once every
/// sink clone is dropped.
pub fn spawn_audit_writer<W>(mut writer: W, capacity: usize) -> (ChannelAuditSink, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<AuditEvent>(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let mut line = match serde_json::to_vec(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!(target: "audit", error = %e, "failed to serialise audit event");
                    continue;
                }
            };
            line.push(b'\n');

            if let Err(e) = writer.write_all(&line).await {
                warn!(target: "audit", error = %e, "audit write failed");
                continue;
            }
            if let Err(e) = writer.flush().await {
                warn!(target: "audit", error = %e, "audit flush failed");
            }
        }
    });

    let sink = ChannelAuditSink {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sink, handle)
}
