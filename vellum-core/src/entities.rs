//! Core entity structures for the memory engine's data model

use crate::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A typed, owned, time-stamped claim with provenance.
///
/// Every query against a `Memory` must be filtered by `user_id` before any
/// other predicate — see `MemoryProvider` in `vellum-store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Memory {
    pub id: MemoryId,
    pub user_id: UserId,
    pub project_id: Option<ProjectId>,
    pub tenant_id: Option<TenantId>,
    pub content: String,
    pub memory_type: MemoryType,
    /// Extraction confidence, always within `[0.0, 1.0]`.
    pub confidence: f32,
    /// Free-text source label, e.g. `conversation`, `user`, `documentation`,
    /// `manual`, `adr`, `commit`.
    pub source: String,
    pub raw_source: String,
    pub extraction_version: i32,
    pub created_at: Timestamp,
    pub last_access_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub embedding: Option<EmbeddingVector>,
    pub validity: Validity,
    pub scope: Scope,
    /// Bounded structured metadata, validated the same way provenance
    /// metadata is validated.
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
}

impl Memory {
    pub fn is_live(&self) -> bool {
        self.validity.is_live()
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.map(|exp| exp < now).unwrap_or(false)
    }
}

/// Patch payload accepted by `MemoryProvider::update`. Only `Some` fields are
/// applied; applying a patch always bumps `extraction_version` and records a
/// provenance `update` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub confidence: Option<f32>,
    pub scope: Option<Scope>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub metadata: Option<serde_json::Value>,
}

/// Typed filter accepted by `MemoryProvider::search`. Composed with the
/// mandatory owner predicate, never in place of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MemoryFilter {
    pub memory_type: Option<MemoryType>,
    pub scope: Option<Scope>,
    pub source: Option<String>,
    pub created_after: Option<Timestamp>,
    pub created_before: Option<Timestamp>,
    /// When `true` (the default for retrieval paths), invalidated memories
    /// are excluded.
    pub valid_only: bool,
}

impl MemoryFilter {
    pub fn matches(&self, memory: &Memory) -> bool {
        if self.valid_only && !memory.is_live() {
            return false;
        }
        if let Some(t) = self.memory_type {
            if memory.memory_type != t {
                return false;
            }
        }
        if let Some(s) = self.scope {
            if memory.scope != s {
                return false;
            }
        }
        if let Some(ref source) = self.source {
            if &memory.source != source {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if memory.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if memory.created_at > before {
                return false;
            }
        }
        true
    }
}

/// One event in a memory's append-only provenance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProvenanceRecord {
    pub id: ProvenanceId,
    pub memory_id: MemoryId,
    pub kind: ProvenanceEventKind,
    /// Stringified identifier of the acting user or agent.
    pub actor_id: String,
    pub timestamp: Timestamp,
    /// Present only for `ProvenanceEventKind::Retrieval` events, in `[0, 1]`.
    pub score: Option<f32>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
}

/// Evidence attached to every ingested claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Evidence {
    pub claim: String,
    pub captured_at: Timestamp,
    pub confidence_label: ConfidenceLabel,
    /// e.g. `ADR-003`, `commit:<hex>`, or a URL.
    pub source_id: Option<String>,
    pub validity_horizon: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
}

/// A registered agent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    pub id: AgentId,
    pub agent_type: AgentType,
    pub owner_user_id: UserId,
    pub created_at: Timestamp,
    pub active: bool,
    pub status: AgentStatus,
    pub capabilities: HashSet<Capability>,
}

impl Agent {
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

/// A named set of agents sharing memories at a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    pub owner: AgentId,
    pub scope: Scope,
    pub members: HashMap<AgentId, PoolPermission>,
    pub shared_memory_ids: HashSet<MemoryId>,
    pub created_at: Timestamp,
}

impl Pool {
    pub fn member_permission(&self, agent: AgentId) -> Option<PoolPermission> {
        self.members.get(&agent).copied()
    }

    pub fn can_write(&self, agent: AgentId) -> bool {
        matches!(
            self.member_permission(agent),
            Some(PoolPermission::Write) | Some(PoolPermission::Admin)
        )
    }
}

/// A single append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditEvent {
    pub seq: u64,
    pub timestamp: Timestamp,
    pub kind: AuditEventKind,
    pub actor_id: String,
    pub resource_id: String,
    pub action: String,
    pub outcome: AuditOutcome,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
}
