//! Vellum Agents: the agent registry, shared-memory pools, and the handoff
//! manager.
//!
//! The registry authenticates nothing; it trusts the caller to pass a
//! resolved `owner_user_id`/`acting_agent`. The tool-dispatch edge is
//! responsible for authentication. Inside this crate every sensitive call
//! still performs authorization (capability check, scope check, membership
//! check) as defense in depth.

use std::sync::Arc;

use vellum_core::{AuditEventKind, AuditOutcome};
use vellum_audit::AuditLogger;

mod handoff_manager;
mod pools;
mod registry;

pub use handoff_manager::HandoffManager;
pub use pools::PoolManager;
pub use registry::AgentRegistry;

fn audit_event(
    audit: &Option<Arc<AuditLogger>>,
    kind: AuditEventKind,
    actor: &str,
    resource: &str,
    action: &str,
    outcome: AuditOutcome,
) {
    if let Some(audit) = audit {
        audit.record(kind, actor, resource, action, outcome, serde_json::json!({}));
    }
}
