use super::{prompts, strip_code_fence, write_artifact};
use crate::llm::LlmClient;
use crate::profiles::RoleProfile;
use agentpipe_core::{Agent, AgentRole, AgentpipeResult, Task};
use agentpipe_memory::{MemoryGraph, Metadata};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_OUTPUT: &str = "generated_code.py";
const CONTEXT_HITS: usize = 3;

/// Writes a module for a task description, consulting and feeding the
/// shared memory graph.
pub struct CoderAgent {
    llm: Arc<LlmClient>,
    profile: RoleProfile,
    output_dir: PathBuf,
    memory: Arc<MemoryGraph>,
}

impl CoderAgent {
    pub fn new(
        llm: Arc<LlmClient>,
        profile: RoleProfile,
        output_dir: PathBuf,
        memory: Arc<MemoryGraph>,
    ) -> Self {
        Self {
            llm,
            profile,
            output_dir,
            memory,
        }
    }

    async fn memory_context(&self, description: &str) -> String {
        match self.memory.query(description, None, CONTEXT_HITS).await {
            Ok(hits) => hits
                .into_iter()
                .map(|h| h.text)
                .collect::<Vec<_>>()
                .join("\n\n"),
            Err(e) => {
                warn!(error = %e, "Memory lookup failed, continuing without context");
                String::new()
            }
        }
    }
}

#[async_trait]
impl Agent for CoderAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Coder
    }

    async fn run_task(&self, task: &Task) -> AgentpipeResult<Vec<PathBuf>> {
        let context = self.memory_context(&task.description).await;
        let prompt = prompts::coder(&task.description, &context);
        let response = self
            .llm
            .complete(&prompt, &self.profile.model_id, self.profile.temperature)
            .await?;
        let code = strip_code_fence(&response);

        let file_name = task.output_file.as_deref().unwrap_or(DEFAULT_OUTPUT);
        let path = write_artifact(&self.output_dir, file_name, &code).await?;
        info!(path = %path.display(), "Code written");

        let mut metadata = Metadata::new();
        metadata.insert("task".into(), serde_json::json!(task.description));
        metadata.insert("file".into(), serde_json::json!(file_name));
        if let Err(e) = self.memory.add_memory(&code, metadata, 1.0).await {
            warn!(error = %e, file = file_name, "Could not record generated code in memory");
        }

        Ok(vec![path])
    }
}
