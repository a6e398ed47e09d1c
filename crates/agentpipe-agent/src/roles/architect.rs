use super::{prompts, strip_code_fence, write_artifact};
use crate::llm::LlmClient;
use crate::profiles::RoleProfile;
use agentpipe_core::{Agent, AgentRole, AgentpipeError, AgentpipeResult, Task};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const DEFAULT_PLAN_NAME: &str = "architecture_plan";

/// Turns a feature description into a Markdown architecture plan.
///
/// The plan lands at `<plan_dir>/<output_file>.md`, or
/// `<plan_dir>/architecture_plan.md` when the task names no output.
pub struct ArchitectAgent {
    llm: Arc<LlmClient>,
    profile: RoleProfile,
    plan_dir: PathBuf,
}

impl ArchitectAgent {
    pub fn new(llm: Arc<LlmClient>, profile: RoleProfile, plan_dir: PathBuf) -> Self {
        Self {
            llm,
            profile,
            plan_dir,
        }
    }

    /// Where the plan for `task` is written.
    pub fn plan_path(&self, task: &Task) -> PathBuf {
        self.plan_dir.join(plan_file_name(task))
    }
}

fn plan_file_name(task: &Task) -> String {
    let base = task.output_file.as_deref().unwrap_or(DEFAULT_PLAN_NAME);
    if base.ends_with(".md") {
        base.to_string()
    } else {
        format!("{base}.md")
    }
}

#[async_trait]
impl Agent for ArchitectAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Architect
    }

    async fn run_task(&self, task: &Task) -> AgentpipeResult<Vec<PathBuf>> {
        let prompt = prompts::architect(&task.description);
        let response = self
            .llm
            .complete(&prompt, &self.profile.model_id, self.profile.temperature)
            .await?;
        let plan = strip_code_fence(&response);
        if plan.is_empty() {
            return Err(AgentpipeError::Plan(format!(
                "model returned an empty plan for: {}",
                task.description
            )));
        }

        let path = write_artifact(&self.plan_dir, &plan_file_name(task), &plan).await?;
        info!(path = %path.display(), "Architecture plan written");
        Ok(vec![path])
    }
}
