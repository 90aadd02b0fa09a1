//! Pre-built fixtures for common test scenarios.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use vellum_core::{
    Agent, AgentId, AgentStatus, AgentType, Capability, EngineConfig, EntityIdType, HandoffData,
    Memory, MemoryType, Pool, PoolId, PoolPermission, Scope, UserId, Validity,
};

/// A reference `EngineConfig` suitable for most tests; override individual
/// fields on the returned value for a specific scenario.
pub fn test_config() -> EngineConfig {
    EngineConfig::reference()
}

/// A live, mid-confidence `Fact` memory owned by `owner`.
pub fn sample_memory(owner: UserId, content: &str) -> Memory {
    let now = Utc::now();
    Memory {
        id: vellum_core::MemoryId::now_v7(),
        user_id: owner,
        project_id: None,
        tenant_id: None,
        content: content.to_string(),
        memory_type: MemoryType::Fact,
        confidence: 0.8,
        source: "conversation".to_string(),
        raw_source: String::new(),
        extraction_version: 1,
        created_at: now,
        last_access_at: now,
        expires_at: None,
        embedding: None,
        validity: Validity::Live,
        scope: Scope::User,
        metadata: serde_json::json!({}),
    }
}

pub fn invalidated_memory(owner: UserId, content: &str, reason: &str) -> Memory {
    let mut memory = sample_memory(owner, content);
    memory.validity = Validity::Invalidated {
        reason: reason.to_string(),
    };
    memory
}

/// An idle agent owned by `owner`, granted exactly `capabilities`.
pub fn sample_agent(owner: UserId, capabilities: &[Capability]) -> Agent {
    Agent {
        id: AgentId::now_v7(),
        agent_type: AgentType::ClaudeCode,
        owner_user_id: owner,
        created_at: Utc::now(),
        active: false,
        status: AgentStatus::Idle,
        capabilities: capabilities.iter().copied().collect(),
    }
}

/// A pool owned by `owner` at `scope`, with `owner` already a member with
/// `Admin` permission.
pub fn sample_pool(owner: AgentId, scope: Scope) -> Pool {
    let mut members = HashMap::new();
    members.insert(owner, PoolPermission::Admin);
    Pool {
        id: PoolId::now_v7(),
        name: "test-pool".to_string(),
        owner,
        scope,
        members,
        shared_memory_ids: HashSet::new(),
        created_at: Utc::now(),
    }
}

/// A freshly initiated handoff, not yet accepted, with a generous TTL.
pub fn sample_handoff_data(source: AgentId, target: AgentId) -> HandoffData {
    HandoffData {
        handoff_id: vellum_core::HandoffId::now_v7(),
        source_agent: source,
        target_agent: target,
        task_description: "migrate storage backend".to_string(),
        current_state: "design approved".to_string(),
        relevant_memory_ids: vec![],
        relevant_file_ids: vec![],
        created_at: Utc::now(),
        ttl_ms: 60_000,
        accepted_at: None,
        completed_at: None,
        rejection_reason: None,
        result: None,
    }
}
