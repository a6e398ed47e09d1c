use super::{file_stem, prompts, read_input, strip_code_fence, write_artifact};
use crate::llm::LlmClient;
use crate::profiles::RoleProfile;
use agentpipe_core::{Agent, AgentRole, AgentpipeError, AgentpipeResult, Task};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Testing, QA, refactoring, and documentation share one shape: read a
/// generated module, ask the model for something derived from it, write
/// the result under the role's own directory.
pub struct SourceAgent {
    role: AgentRole,
    llm: Arc<LlmClient>,
    profile: RoleProfile,
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl SourceAgent {
    /// Fails for the architect and coder roles, which do not read a source module.
    pub fn try_new(
        role: AgentRole,
        llm: Arc<LlmClient>,
        profile: RoleProfile,
        source_dir: PathBuf,
        output_dir: PathBuf,
    ) -> AgentpipeResult<Self> {
        if matches!(role, AgentRole::Architect | AgentRole::Coder) {
            return Err(AgentpipeError::Config(format!(
                "{} does not work from an existing module",
                role.display_name()
            )));
        }
        Ok(Self::new(role, llm, profile, source_dir, output_dir))
    }

    pub(crate) fn new(
        role: AgentRole,
        llm: Arc<LlmClient>,
        profile: RoleProfile,
        source_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            role,
            llm,
            profile,
            source_dir,
            output_dir,
        }
    }

    /// Output file name for a module, per role.
    pub fn output_name(&self, task: &Task, input: &str) -> String {
        let stem = file_stem(input);
        match self.role {
            AgentRole::Tester => task
                .output_file
                .clone()
                .unwrap_or_else(|| format!("test_{input}")),
            AgentRole::Qa => format!("{stem}_qa_report.md"),
            AgentRole::Refactorer => format!("{stem}_refactored.py"),
            AgentRole::Documenter => format!("{stem}_README.md"),
            AgentRole::Architect | AgentRole::Coder => format!("{stem}_{}.md", self.role),
        }
    }
}

#[async_trait]
impl Agent for SourceAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    async fn run_task(&self, task: &Task) -> AgentpipeResult<Vec<PathBuf>> {
        let (input, code) = read_input(&self.source_dir, task).await?;
        let prompt = prompts::from_source(self.role, &input, &code);
        let response = self
            .llm
            .complete(&prompt, &self.profile.model_id, self.profile.temperature)
            .await?;

        let body = match self.role {
            AgentRole::Tester | AgentRole::Refactorer => strip_code_fence(&response),
            _ => response.trim().to_string(),
        };

        let name = self.output_name(task, &input);
        let path = write_artifact(&self.output_dir, &name, &body).await?;
        info!(role = %self.role, path = %path.display(), "Artifact written");
        Ok(vec![path])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backends::CompletionBackend;

    struct Silent;

    #[async_trait]
    impl CompletionBackend for Silent {
        async fn complete(&self, _: &str, _: &str, _: f32) -> AgentpipeResult<String> {
            Ok(String::new())
        }
    }

    fn agent(role: AgentRole) -> SourceAgent {
        SourceAgent::new(
            role,
            Arc::new(LlmClient::from_backend(Box::new(Silent))),
            RoleProfile {
                model_id: "m".into(),
                temperature: 0.0,
            },
            PathBuf::from("src"),
            PathBuf::from("out"),
        )
    }

    #[test]
    fn test_output_names() {
        let task = Task::new(AgentRole::Tester, "Write tests for loader.py").with_input("loader.py");
        assert_eq!(agent(AgentRole::Tester).output_name(&task, "loader.py"), "test_loader.py");
        assert_eq!(
            agent(AgentRole::Tester)
                .output_name(&task.clone().with_output("test_custom.py"), "loader.py"),
            "test_custom.py"
        );
        assert_eq!(agent(AgentRole::Qa).output_name(&task, "loader.py"), "loader_qa_report.md");
        assert_eq!(
            agent(AgentRole::Refactorer).output_name(&task, "loader.py"),
            "loader_refactored.py"
        );
        assert_eq!(
            agent(AgentRole::Documenter).output_name(&task, "loader.py"),
            "loader_README.md"
        );
    }

    #[test]
    fn test_try_new_rejects_generating_roles() {
        let llm = Arc::new(LlmClient::from_backend(Box::new(Silent)));
        let profile = RoleProfile {
            model_id: "m".into(),
            temperature: 0.0,
        };
        assert!(SourceAgent::try_new(
            AgentRole::Coder,
            llm.clone(),
            profile.clone(),
            PathBuf::new(),
            PathBuf::new()
        )
        .is_err());
        assert!(SourceAgent::try_new(AgentRole::Qa, llm, profile, PathBuf::new(), PathBuf::new()).is_ok());
    }
}
