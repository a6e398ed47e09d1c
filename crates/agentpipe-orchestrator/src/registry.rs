use agentpipe_core::{Agent, AgentRole, AgentpipeError, AgentpipeResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Roles whose tasks a producer role's expansion creates.
pub fn expansion_targets(role: AgentRole) -> &'static [AgentRole] {
    match role {
        AgentRole::Architect => &[AgentRole::Coder, AgentRole::Tester],
        AgentRole::Coder => &[AgentRole::Refactorer, AgentRole::Documenter],
        AgentRole::Tester | AgentRole::Qa | AgentRole::Refactorer | AgentRole::Documenter => &[],
    }
}

/// Agents keyed by the role they serve. At most one agent per role.
#[derive(Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentRole, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `agent` under its own role, returning any agent it replaces.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        self.agents.insert(agent.role(), agent)
    }

    pub fn get(&self, role: AgentRole) -> Option<&Arc<dyn Agent>> {
        self.agents.get(&role)
    }

    pub fn contains(&self, role: AgentRole) -> bool {
        self.agents.contains_key(&role)
    }

    /// Registered roles in pipeline order.
    pub fn roles(&self) -> Vec<AgentRole> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Check that every task a registered role can create has a handler.
    pub fn validate(&self) -> AgentpipeResult<()> {
        for role in self.agents.keys() {
            let missing: Vec<String> = expansion_targets(*role)
                .iter()
                .filter(|target| !self.contains(**target))
                .map(|target| target.display_name().to_string())
                .collect();
            if !missing.is_empty() {
                return Err(AgentpipeError::Config(format!(
                    "{} creates tasks for unregistered roles: {}",
                    role.display_name(),
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<Arc<dyn Agent>> for AgentRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Agent>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for agent in iter {
            registry.register(agent);
        }
        registry
    }
}
