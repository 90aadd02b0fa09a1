//! Shared-memory pools: named groups of agents sharing memories at a scope.
//!
//! `Pool::shared_memory_ids` only tracks which memories are shared; the
//! scope each memory was shared at is tracked here in a side table, since
//! that is an attribute of the (queryable) sharing decision, not of the pool
//! entity. `query_shared` never returns the underlying `Memory` content —
//! this crate has no storage dependency — only the set of ids a caller is
//! cleared to read, which it then resolves against a `MemoryProvider`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use vellum_core::{
    AgentError, AgentId, AuditEventKind, AuditOutcome, EngineError, EngineResult, EntityIdType,
    MemoryId, Pool, PoolId, PoolPermission, Scope,
};
use vellum_audit::AuditLogger;

use crate::audit_event;
use crate::registry::AgentRegistry;

pub struct PoolManager {
    max_pools: usize,
    max_members_per_pool: usize,
    max_shared_per_pool: usize,
    pools: RwLock<HashMap<PoolId, Pool>>,
    /// Scope each memory was shared at, keyed by (pool, memory) since the
    /// same memory id could in principle be shared into more than one pool.
    shared_scopes: RwLock<HashMap<(PoolId, MemoryId), Scope>>,
    audit: Option<Arc<AuditLogger>>,
}

impl PoolManager {
    pub fn new(max_pools: usize, max_members_per_pool: usize, max_shared_per_pool: usize) -> Self {
        Self {
            max_pools,
            max_members_per_pool,
            max_shared_per_pool,
            pools: RwLock::new(HashMap::new()),
            shared_scopes: RwLock::new(HashMap::new()),
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn create_pool(&self, name: String, owner: AgentId, scope: Scope) -> EngineResult<PoolId> {
        let mut pools = self.pools.write().expect("pool registry lock poisoned");
        if pools.len() >= self.max_pools {
            return Err(EngineError::Agent(AgentError::PoolCapacityExceeded));
        }
        let id = PoolId::now_v7();
        let mut members = HashMap::new();
        members.insert(owner, PoolPermission::Admin);
        pools.insert(
            id,
            Pool {
                id,
                name,
                owner,
                scope,
                members,
                shared_memory_ids: HashSet::new(),
                created_at: Utc::now(),
            },
        );
        drop(pools);
        audit_event(
            &self.audit,
            AuditEventKind::PoolOperation,
            &owner.to_string(),
            &id.to_string(),
            "create_pool",
            AuditOutcome::Success,
        );
        Ok(id)
    }

    /// Verifies the agent exists in the registry (integrity), then writes a
    /// membership record plus an audit event.
    pub fn join_pool(
        &self,
        pool: PoolId,
        agent: AgentId,
        permission: PoolPermission,
        registry: &AgentRegistry,
    ) -> EngineResult<()> {
        if !registry.is_registered(agent) {
            return Err(EngineError::Agent(AgentError::IntegrityViolation(format!(
                "{agent}"
            ))));
        }
        let mut pools = self.pools.write().expect("pool registry lock poisoned");
        let entry = pools.get_mut(&pool).ok_or(EngineError::Agent(AgentError::PoolNotFound(pool)))?;
        if !entry.members.contains_key(&agent) && entry.members.len() >= self.max_members_per_pool {
            return Err(EngineError::Agent(AgentError::MemberCapacityExceeded));
        }
        entry.members.insert(agent, permission);
        drop(pools);
        audit_event(
            &self.audit,
            AuditEventKind::PoolOperation,
            &agent.to_string(),
            &pool.to_string(),
            "join_pool",
            AuditOutcome::Success,
        );
        Ok(())
    }

    /// Requires the agent to have `write` permission in the pool, and the
    /// memory's scope to be `<=` the pool's configured scope.
    pub fn share_memory(
        &self,
        pool: PoolId,
        memory_id: MemoryId,
        memory_scope: Scope,
        agent: AgentId,
    ) -> EngineResult<()> {
        let mut pools = self.pools.write().expect("pool registry lock poisoned");
        let entry = pools.get_mut(&pool).ok_or(EngineError::Agent(AgentError::PoolNotFound(pool)))?;

        if !entry.can_write(agent) {
            audit_event(
                &self.audit,
                AuditEventKind::PermissionDenied,
                &agent.to_string(),
                &pool.to_string(),
                "share_memory",
                AuditOutcome::Denied,
            );
            return Err(EngineError::Agent(AgentError::InsufficientPoolPermission(format!(
                "{agent}"
            ))));
        }
        if memory_scope > entry.scope {
            return Err(EngineError::Agent(AgentError::ScopeViolation));
        }
        if !entry.shared_memory_ids.contains(&memory_id) && entry.shared_memory_ids.len() >= self.max_shared_per_pool {
            return Err(EngineError::Agent(AgentError::SharedCapacityExceeded));
        }

        entry.shared_memory_ids.insert(memory_id);
        drop(pools);
        self.shared_scopes
            .write()
            .expect("shared-scope lock poisoned")
            .insert((pool, memory_id), memory_scope);

        audit_event(
            &self.audit,
            AuditEventKind::PoolOperation,
            &agent.to_string(),
            &pool.to_string(),
            "share_memory",
            AuditOutcome::Success,
        );
        Ok(())
    }

    /// Returns the ids of memories shared into `pool` at a scope `<=
    /// min(max_scope, pool.scope)`. An agent's own ceiling is the pool's
    /// configured scope, since membership (not the agent entity itself)
    /// is what this data model uses to bound visibility.
    pub fn query_shared(&self, pool: PoolId, agent: AgentId, max_scope: Scope) -> EngineResult<Vec<MemoryId>> {
        let pools = self.pools.read().expect("pool registry lock poisoned");
        let entry = pools.get(&pool).ok_or(EngineError::Agent(AgentError::PoolNotFound(pool)))?;
        if entry.member_permission(agent).is_none() {
            audit_event(
                &self.audit,
                AuditEventKind::PermissionDenied,
                &agent.to_string(),
                &pool.to_string(),
                "query_shared",
                AuditOutcome::Denied,
            );
            return Err(EngineError::Agent(AgentError::InsufficientPoolPermission(format!(
                "{agent}"
            ))));
        }
        let ceiling = std::cmp::min(max_scope, entry.scope);
        let ids: Vec<MemoryId> = entry.shared_memory_ids.iter().copied().collect();
        drop(pools);

        let scopes = self.shared_scopes.read().expect("shared-scope lock poisoned");
        let result: Vec<MemoryId> = ids
            .into_iter()
            .filter(|id| scopes.get(&(pool, *id)).map(|s| *s <= ceiling).unwrap_or(false))
            .collect();
        drop(scopes);

        audit_event(
            &self.audit,
            AuditEventKind::CrossAgentRead,
            &agent.to_string(),
            &pool.to_string(),
            "query_shared",
            AuditOutcome::Success,
        );
        Ok(result)
    }

    pub fn get_pool(&self, pool: PoolId) -> EngineResult<Pool> {
        self.pools
            .read()
            .expect("pool registry lock poisoned")
            .get(&pool)
            .cloned()
            .ok_or(EngineError::Agent(AgentError::PoolNotFound(pool)))
    }
}
