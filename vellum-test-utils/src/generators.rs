//! Proptest strategies for the core entity types.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use uuid::Uuid;
use vellum_core::{
    Agent, AgentId, AgentStatus, AgentType, Capability, EmbeddingVector, EntityIdType, Memory,
    MemoryId, MemoryType, ProjectId, Scope, TenantId, UserId, Validity,
};

/// A random UUID, for generic id generation.
pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
    any::<[u8; 16]>().prop_map(Uuid::from_bytes)
}

pub fn arb_user_id() -> impl Strategy<Value = UserId> {
    arb_uuid().prop_map(UserId::new)
}

pub fn arb_memory_id() -> impl Strategy<Value = MemoryId> {
    arb_uuid().prop_map(MemoryId::new)
}

pub fn arb_agent_id() -> impl Strategy<Value = AgentId> {
    arb_uuid().prop_map(AgentId::new)
}

/// Timestamps within a reasonable calendar range, so derived durations stay
/// sane without special-casing the Unix epoch or the far future.
pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800i64..1_893_456_000i64).prop_map(|secs| {
        DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
    })
}

pub fn arb_memory_type() -> impl Strategy<Value = MemoryType> {
    prop_oneof![
        Just(MemoryType::Preference),
        Just(MemoryType::Fact),
        Just(MemoryType::Decision),
    ]
}

pub fn arb_scope() -> impl Strategy<Value = Scope> {
    prop_oneof![
        Just(Scope::AgentPrivate),
        Just(Scope::User),
        Just(Scope::Project),
        Just(Scope::Team),
        Just(Scope::Global),
    ]
}

/// Confidence is always clamped into `[0.0, 1.0]`, matching the invariant
/// every `Memory` must satisfy.
pub fn arb_confidence() -> impl Strategy<Value = f32> {
    0.0f32..=1.0f32
}

pub fn arb_validity() -> impl Strategy<Value = Validity> {
    prop_oneof![
        Just(Validity::Live),
        "[a-z_]{3,24}".prop_map(|reason| Validity::Invalidated { reason }),
    ]
}

pub fn arb_capability() -> impl Strategy<Value = Capability> {
    prop_oneof![
        Just(Capability::MemoryRead),
        Just(Capability::MemoryWrite),
        Just(Capability::MemoryDelete),
        Just(Capability::KbSearch),
        Just(Capability::DecisionRead),
        Just(Capability::IncidentRead),
        Just(Capability::HandoffInitiate),
        Just(Capability::HandoffReceive),
    ]
}

pub fn arb_agent_type() -> impl Strategy<Value = AgentType> {
    prop_oneof![
        Just(AgentType::ClaudeCode),
        Just(AgentType::GptAgent),
        Just(AgentType::CustomPipeline),
        Just(AgentType::Human),
    ]
}

/// A well-formed `Memory`: byte-bounded content, a created_at no later than
/// last_access_at, and no embedding (callers needing one should attach it
/// after generation, since dimensionality is a provider-level concern).
pub fn arb_memory() -> impl Strategy<Value = Memory> {
    (
        arb_memory_id(),
        arb_user_id(),
        "[a-zA-Z0-9 .,']{1,512}",
        arb_memory_type(),
        arb_confidence(),
        arb_scope(),
        arb_validity(),
        arb_timestamp(),
    )
        .prop_map(|(id, user_id, content, memory_type, confidence, scope, validity, created_at)| Memory {
            id,
            user_id,
            project_id: None::<ProjectId>,
            tenant_id: None::<TenantId>,
            content,
            memory_type,
            confidence,
            source: "conversation".to_string(),
            raw_source: String::new(),
            extraction_version: 1,
            created_at,
            last_access_at: created_at,
            expires_at: None,
            embedding: None::<EmbeddingVector>,
            validity,
            scope,
            metadata: serde_json::json!({}),
        })
}

/// A well-formed `Agent` with an empty capability set; compose with
/// `arb_capability()` when a test needs specific capabilities granted.
pub fn arb_agent() -> impl Strategy<Value = Agent> {
    (arb_agent_id(), arb_agent_type(), arb_user_id(), arb_timestamp()).prop_map(
        |(id, agent_type, owner_user_id, created_at)| Agent {
            id,
            agent_type,
            owner_user_id,
            created_at,
            active: false,
            status: AgentStatus::Idle,
            capabilities: Default::default(),
        },
    )
}
