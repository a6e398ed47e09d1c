use crate::config::LlmProvider;
use agentpipe_core::{AgentRole, AgentpipeResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model and sampling settings for one agent role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub model_id: String,
    pub temperature: f32,
}

impl RoleProfile {
    fn new(model_id: &str, temperature: f32) -> Self {
        Self {
            model_id: model_id.to_string(),
            temperature,
        }
    }
}

/// Per-role profiles: provider defaults plus configured overrides.
#[derive(Debug, Clone)]
pub struct Profiles {
    provider: LlmProvider,
    overrides: HashMap<AgentRole, RoleProfile>,
}

impl Profiles {
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            overrides: HashMap::new(),
        }
    }

    /// Apply overrides keyed by role name as written in config files
    /// (`coding`, `"Coding Agent"`, ...).
    pub fn with_named_overrides(
        mut self,
        overrides: &HashMap<String, RoleProfile>,
    ) -> AgentpipeResult<Self> {
        for (name, profile) in overrides {
            let role: AgentRole = name.parse()?;
            self.overrides.insert(role, profile.clone());
        }
        Ok(self)
    }

    /// The profile used for `role`.
    pub fn get(&self, role: AgentRole) -> RoleProfile {
        self.overrides
            .get(&role)
            .cloned()
            .unwrap_or_else(|| default_profile(self.provider, role))
    }
}

/// Planning, coding, and refactoring get the stronger model; review-style
/// roles get the cheaper one. QA samples a little hotter.
pub fn default_profile(provider: LlmProvider, role: AgentRole) -> RoleProfile {
    let (strong, light) = match provider {
        LlmProvider::OpenAi => ("gpt-4o-mini", "gpt-3.5-turbo"),
        LlmProvider::Claude => ("claude-3-5-sonnet-latest", "claude-3-5-haiku-latest"),
    };
    match role {
        AgentRole::Architect | AgentRole::Coder | AgentRole::Refactorer => {
            RoleProfile::new(strong, 0.2)
        }
        AgentRole::Tester | AgentRole::Documenter => RoleProfile::new(light, 0.2),
        AgentRole::Qa => RoleProfile::new(light, 0.3),
    }
}
