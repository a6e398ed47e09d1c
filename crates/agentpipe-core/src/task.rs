use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AgentpipeError;

/// Role of each agent in the pipeline.
///
/// Serialized with the display names used in the persisted task file;
/// the short lowercase names are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentRole {
    /// Turns a feature request into an architecture plan.
    #[serde(rename = "Code Architect Agent", alias = "architect")]
    Architect,
    /// Implements one module.
    #[serde(rename = "Coding Agent", alias = "coding", alias = "coder")]
    Coder,
    /// Writes tests for a module.
    #[serde(rename = "Testing Agent", alias = "testing", alias = "tester")]
    Tester,
    /// Reviews a module and writes a QA report.
    #[serde(rename = "QA Agent", alias = "qa")]
    Qa,
    /// Produces a refactored copy of a module.
    #[serde(rename = "Refactoring Agent", alias = "refactoring", alias = "refactor")]
    Refactorer,
    /// Writes a README for a module.
    #[serde(rename = "Documentation Agent", alias = "documentation", alias = "docs")]
    Documenter,
}

impl AgentRole {
    /// Every role, in pipeline order.
    pub const ALL: [AgentRole; 6] = [
        AgentRole::Architect,
        AgentRole::Coder,
        AgentRole::Tester,
        AgentRole::Qa,
        AgentRole::Refactorer,
        AgentRole::Documenter,
    ];

    /// The name written to the task file.
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Architect => "Code Architect Agent",
            AgentRole::Coder => "Coding Agent",
            AgentRole::Tester => "Testing Agent",
            AgentRole::Qa => "QA Agent",
            AgentRole::Refactorer => "Refactoring Agent",
            AgentRole::Documenter => "Documentation Agent",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::Architect => write!(f, "architect"),
            AgentRole::Coder => write!(f, "coding"),
            AgentRole::Tester => write!(f, "testing"),
            AgentRole::Qa => write!(f, "qa"),
            AgentRole::Refactorer => write!(f, "refactoring"),
            AgentRole::Documenter => write!(f, "documentation"),
        }
    }
}

impl FromStr for AgentRole {
    type Err = AgentpipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        AgentRole::ALL
            .into_iter()
            .find(|role| {
                role.to_string() == wanted || role.display_name().to_lowercase() == wanted
            })
            .or(match wanted.as_str() {
                "coder" => Some(AgentRole::Coder),
                "tester" => Some(AgentRole::Tester),
                "refactor" => Some(AgentRole::Refactorer),
                "docs" => Some(AgentRole::Documenter),
                _ => None,
            })
            .ok_or_else(|| AgentpipeError::Config(format!("Unknown agent: {s}")))
    }
}

/// How a completed task ended. Stored next to `completed` for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    Failed { reason: String },
    Skipped { reason: String },
}

/// A unit of work in the task store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub agent: AgentRole,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskOutcome>,
}

impl Task {
    pub fn new(agent: AgentRole, description: impl Into<String>) -> Self {
        Self {
            agent,
            description: description.into(),
            input_file: None,
            output_file: None,
            completed: false,
            outcome: None,
        }
    }

    pub fn with_input(mut self, input_file: impl Into<String>) -> Self {
        self.input_file = Some(input_file.into());
        self
    }

    pub fn with_output(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = Some(output_file.into());
        self
    }

    /// Identity used for deduplication and completion matching.
    /// `input_file` is deliberately excluded.
    pub fn key(&self) -> TaskKey<'_> {
        TaskKey {
            agent: self.agent,
            description: &self.description,
            output_file: self.output_file.as_deref(),
        }
    }
}

/// The `(agent, description, output_file)` identity of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey<'a> {
    pub agent: AgentRole,
    pub description: &'a str,
    pub output_file: Option<&'a str>,
}

impl fmt::Display for TaskKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.agent, self.description)?;
        if let Some(out) = self.output_file {
            write!(f, " -> {out}")?;
        }
        Ok(())
    }
}
