//! The six pipeline roles.
//!
//! [`ArchitectAgent`] and [`CoderAgent`] create new artifacts from a task
//! description; [`SourceAgent`] covers the four roles that read an existing
//! generated module and write something derived from it.

mod architect;
mod coder;
mod prompts;
mod source;

pub use architect::ArchitectAgent;
pub use coder::CoderAgent;
pub use source::SourceAgent;

use crate::layout::OutputLayout;
use crate::llm::LlmClient;
use crate::profiles::Profiles;
use agentpipe_core::{Agent, AgentRole, AgentpipeError, AgentpipeResult, Task};
use agentpipe_memory::MemoryGraph;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One agent per role, sharing the client, layout, and memory.
pub fn build_agents(
    llm: Arc<LlmClient>,
    profiles: &Profiles,
    layout: &OutputLayout,
    memory: Arc<MemoryGraph>,
) -> Vec<Arc<dyn Agent>> {
    let source = |role: AgentRole, output_dir: &Path| -> Arc<dyn Agent> {
        Arc::new(SourceAgent::new(
            role,
            llm.clone(),
            profiles.get(role),
            layout.generated_code.clone(),
            output_dir.to_path_buf(),
        ))
    };

    vec![
        Arc::new(ArchitectAgent::new(
            llm.clone(),
            profiles.get(AgentRole::Architect),
            layout.ca_plan.clone(),
        )),
        Arc::new(CoderAgent::new(
            llm.clone(),
            profiles.get(AgentRole::Coder),
            layout.generated_code.clone(),
            memory,
        )),
        source(AgentRole::Tester, &layout.test_code),
        source(AgentRole::Qa, &layout.qa_reports),
        source(AgentRole::Refactorer, &layout.refactored_code),
        source(AgentRole::Documenter, &layout.readme),
    ]
}

/// Remove a surrounding Markdown code fence (with optional language tag).
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the language tag line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

/// File name without its final extension.
pub(crate) fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Read the module named by `task.input_file` from `dir`.
pub(crate) async fn read_input(dir: &Path, task: &Task) -> AgentpipeResult<(String, String)> {
    let name = task.input_file.as_deref().ok_or_else(|| {
        AgentpipeError::Agent(format!("Task has no input_file: {}", task.description))
    })?;
    let path = dir.join(name);
    if !path.exists() {
        return Err(AgentpipeError::NotFound(format!(
            "input file {}",
            path.display()
        )));
    }
    let content = tokio::fs::read_to_string(&path).await?;
    Ok((name.to_string(), content))
}

/// Write `content` to `dir/name`, creating `dir` as needed.
pub(crate) async fn write_artifact(dir: &Path, name: &str, content: &str) -> AgentpipeResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, content).await?;
    Ok(path)
}
