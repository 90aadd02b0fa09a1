//! Vellum Audit - append-only, bounded, structured event stream.
//!
//! Every write path in the other crates (store, provenance, ingestion,
//! agents, handoffs) emits through this logger. Events flow forward only;
//! there is no upstream signaling here — the audit log is a sink, not a
//! coordination channel.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::Utc;
use vellum_core::{AuditEvent, AuditEventKind, AuditOutcome};

/// Append-only, bounded audit log. Oldest events are evicted once
/// `max_events` is reached (LRU by insertion order, since entries are never
/// individually touched after append).
pub struct AuditLogger {
    max_events: usize,
    inner: RwLock<AuditLoggerInner>,
}

struct AuditLoggerInner {
    events: VecDeque<AuditEvent>,
    next_seq: u64,
}

impl AuditLogger {
    pub fn new(max_events: usize) -> Self {
        Self {
            max_events,
            inner: RwLock::new(AuditLoggerInner {
                events: VecDeque::new(),
                next_seq: 0,
            }),
        }
    }

    /// Append a new audit event, evicting the oldest entry if at capacity.
    /// Never fails — an audit logger that can reject writes would let a
    /// denial-of-service attacker suppress the evidence of the attack.
    pub fn record(
        &self,
        kind: AuditEventKind,
        actor_id: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
        outcome: AuditOutcome,
        metadata: serde_json::Value,
    ) -> u64 {
        let mut inner = self.inner.write().expect("audit log lock poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let event = AuditEvent {
            seq,
            timestamp: Utc::now(),
            kind,
            actor_id: actor_id.into(),
            resource_id: resource_id.into(),
            action: action.into(),
            outcome,
            metadata,
        };

        if inner.events.len() >= self.max_events {
            inner.events.pop_front();
        }
        inner.events.push_back(event);
        seq
    }

    /// Take a point-in-time snapshot of the log. Readers never block a
    /// writer past the clone.
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        let inner = self.inner.read().expect("audit log lock poisoned");
        inner.events.iter().cloned().collect()
    }

    /// Snapshot filtered to a single resource, in append order.
    pub fn snapshot_for_resource(&self, resource_id: &str) -> Vec<AuditEvent> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.resource_id == resource_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("audit log lock poisoned").events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_assigns_monotonic_sequence() {
        let log = AuditLogger::new(10);
        let a = log.record(
            AuditEventKind::MemoryWrite,
            "user-1",
            "mem-1",
            "store",
            AuditOutcome::Success,
            serde_json::json!({}),
        );
        let b = log.record(
            AuditEventKind::MemoryWrite,
            "user-1",
            "mem-2",
            "store",
            AuditOutcome::Success,
            serde_json::json!({}),
        );
        assert_eq!(b, a + 1);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let log = AuditLogger::new(2);
        log.record(
            AuditEventKind::MemoryWrite,
            "u",
            "m1",
            "store",
            AuditOutcome::Success,
            serde_json::json!({}),
        );
        log.record(
            AuditEventKind::MemoryWrite,
            "u",
            "m2",
            "store",
            AuditOutcome::Success,
            serde_json::json!({}),
        );
        log.record(
            AuditEventKind::MemoryWrite,
            "u",
            "m3",
            "store",
            AuditOutcome::Success,
            serde_json::json!({}),
        );
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].resource_id, "m2");
        assert_eq!(snapshot[1].resource_id, "m3");
    }

    #[test]
    fn snapshot_for_resource_filters() {
        let log = AuditLogger::new(10);
        log.record(
            AuditEventKind::MemoryWrite,
            "u",
            "m1",
            "store",
            AuditOutcome::Success,
            serde_json::json!({}),
        );
        log.record(
            AuditEventKind::MemoryInvalidate,
            "u",
            "m2",
            "invalidate",
            AuditOutcome::Success,
            serde_json::json!({}),
        );
        let filtered = log.snapshot_for_resource("m1");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].action, "store");
    }
}
