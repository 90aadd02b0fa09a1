//! The agent registry: register/unregister, capability reads, and the
//! independently-capped notion of an active session.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use vellum_core::{
    Agent, AgentError, AgentId, AgentStatus, AgentType, AuditEventKind, AuditOutcome, Capability,
    EngineError, EngineResult, EntityIdType, UserId,
};
use vellum_audit::AuditLogger;

use crate::audit_event;

/// Register returns a 128-bit identifier; fails at capacity. `unregister`
/// frees it. Active sessions (an agent currently doing work) have their own,
/// separately-configured cap, independent of total registered agents.
pub struct AgentRegistry {
    max_agents: usize,
    max_sessions: usize,
    agents: RwLock<HashMap<AgentId, Agent>>,
    active_sessions: RwLock<HashSet<AgentId>>,
    audit: Option<Arc<AuditLogger>>,
}

impl AgentRegistry {
    pub fn new(max_agents: usize, max_sessions: usize) -> Self {
        Self {
            max_agents,
            max_sessions,
            agents: RwLock::new(HashMap::new()),
            active_sessions: RwLock::new(HashSet::new()),
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Capability sets are deep-copied on the way in, so a caller mutating
    /// their own set afterward cannot retroactively change what was granted
    /// (defeats a TOCTOU window on the input).
    pub fn register(
        &self,
        agent_type: AgentType,
        owner_user_id: UserId,
        capabilities: HashSet<Capability>,
    ) -> EngineResult<AgentId> {
        let mut agents = self.agents.write().expect("agent registry lock poisoned");
        if agents.len() >= self.max_agents {
            audit_event(
                &self.audit,
                AuditEventKind::AgentAuth,
                "system",
                "registry",
                "register",
                AuditOutcome::Denied,
            );
            return Err(EngineError::Agent(AgentError::RegistryCapacityExceeded));
        }

        let id = AgentId::now_v7();
        let agent = Agent {
            id,
            agent_type,
            owner_user_id,
            created_at: chrono::Utc::now(),
            active: false,
            status: AgentStatus::Idle,
            capabilities: capabilities.clone(),
        };
        agents.insert(id, agent);
        drop(agents);

        audit_event(
            &self.audit,
            AuditEventKind::AgentAuth,
            &owner_user_id.to_string(),
            &id.to_string(),
            "register",
            AuditOutcome::Success,
        );
        Ok(id)
    }

    pub fn unregister(&self, agent_id: AgentId) -> EngineResult<()> {
        let mut agents = self.agents.write().expect("agent registry lock poisoned");
        if agents.remove(&agent_id).is_none() {
            return Err(EngineError::Agent(AgentError::NotRegistered));
        }
        drop(agents);
        self.active_sessions
            .write()
            .expect("session lock poisoned")
            .remove(&agent_id);
        audit_event(
            &self.audit,
            AuditEventKind::AgentAuth,
            "system",
            &agent_id.to_string(),
            "unregister",
            AuditOutcome::Success,
        );
        Ok(())
    }

    /// Deep copy; callers never get a handle into the registry's own state.
    pub fn get_agent_info(&self, agent_id: AgentId) -> EngineResult<Agent> {
        self.agents
            .read()
            .expect("agent registry lock poisoned")
            .get(&agent_id)
            .cloned()
            .ok_or(EngineError::Agent(AgentError::NotRegistered))
    }

    pub fn is_registered(&self, agent_id: AgentId) -> bool {
        self.agents
            .read()
            .expect("agent registry lock poisoned")
            .contains_key(&agent_id)
    }

    pub fn has_capability(&self, agent_id: AgentId, capability: Capability) -> EngineResult<bool> {
        Ok(self.get_agent_info(agent_id)?.has_capability(capability))
    }

    pub fn require_capability(&self, agent_id: AgentId, capability: Capability) -> EngineResult<()> {
        if self.has_capability(agent_id, capability)? {
            Ok(())
        } else {
            Err(EngineError::Agent(AgentError::MissingCapability(format!(
                "{capability:?}"
            ))))
        }
    }

    pub fn begin_session(&self, agent_id: AgentId) -> EngineResult<()> {
        if !self.is_registered(agent_id) {
            return Err(EngineError::Agent(AgentError::NotRegistered));
        }
        let mut sessions = self.active_sessions.write().expect("session lock poisoned");
        if sessions.contains(&agent_id) {
            return Ok(());
        }
        if sessions.len() >= self.max_sessions {
            return Err(EngineError::Agent(AgentError::SessionCapacityExceeded));
        }
        sessions.insert(agent_id);
        drop(sessions);

        let mut agents = self.agents.write().expect("agent registry lock poisoned");
        if let Some(agent) = agents.get_mut(&agent_id) {
            agent.active = true;
            agent.status = AgentStatus::Active;
        }
        Ok(())
    }

    pub fn end_session(&self, agent_id: AgentId) -> EngineResult<()> {
        self.active_sessions
            .write()
            .expect("session lock poisoned")
            .remove(&agent_id);
        let mut agents = self.agents.write().expect("agent registry lock poisoned");
        if let Some(agent) = agents.get_mut(&agent_id) {
            agent.active = false;
            agent.status = AgentStatus::Idle;
        }
        Ok(())
    }

    pub fn active_session_count(&self) -> usize {
        self.active_sessions.read().expect("session lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(list: &[Capability]) -> HashSet<Capability> {
        list.iter().copied().collect()
    }

    #[test]
    fn register_then_fetch_deep_copy() {
        let registry = AgentRegistry::new(10, 10);
        let owner = UserId::now_v7();
        let id = registry
            .register(AgentType::ClaudeCode, owner, caps(&[Capability::MemoryRead]))
            .unwrap();
        let fetched = registry.get_agent_info(id).unwrap();
        assert_eq!(fetched.owner_user_id, owner);
        assert!(fetched.has_capability(Capability::MemoryRead));
        assert!(!fetched.has_capability(Capability::MemoryWrite));
    }

    #[test]
    fn registry_capacity_is_enforced() {
        let registry = AgentRegistry::new(1, 10);
        let owner = UserId::now_v7();
        registry.register(AgentType::ClaudeCode, owner, caps(&[])).unwrap();
        let result = registry.register(AgentType::ClaudeCode, owner, caps(&[]));
        assert!(matches!(result, Err(EngineError::Agent(AgentError::RegistryCapacityExceeded))));
    }

    #[test]
    fn unregister_frees_capacity() {
        let registry = AgentRegistry::new(1, 10);
        let owner = UserId::now_v7();
        let id = registry.register(AgentType::ClaudeCode, owner, caps(&[])).unwrap();
        registry.unregister(id).unwrap();
        registry.register(AgentType::ClaudeCode, owner, caps(&[])).unwrap();
    }

    #[test]
    fn unregister_unknown_agent_fails() {
        let registry = AgentRegistry::new(10, 10);
        let result = registry.unregister(AgentId::now_v7());
        assert!(matches!(result, Err(EngineError::Agent(AgentError::NotRegistered))));
    }

    #[test]
    fn session_capacity_is_separate_from_registry_capacity() {
        let registry = AgentRegistry::new(10, 1);
        let owner = UserId::now_v7();
        let a = registry.register(AgentType::ClaudeCode, owner, caps(&[])).unwrap();
        let b = registry.register(AgentType::ClaudeCode, owner, caps(&[])).unwrap();
        registry.begin_session(a).unwrap();
        let result = registry.begin_session(b);
        assert!(matches!(result, Err(EngineError::Agent(AgentError::SessionCapacityExceeded))));
    }

    #[test]
    fn capability_input_is_deep_copied() {
        let registry = AgentRegistry::new(10, 10);
        let owner = UserId::now_v7();
        let mut granted = caps(&[Capability::MemoryRead]);
        let id = registry.register(AgentType::ClaudeCode, owner, granted.clone()).unwrap();
        granted.insert(Capability::MemoryDelete);
        assert!(!registry.get_agent_info(id).unwrap().has_capability(Capability::MemoryDelete));
    }
}
