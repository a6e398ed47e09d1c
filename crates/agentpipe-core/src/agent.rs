use crate::task::{AgentRole, Task};
use crate::AgentpipeResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// A pipeline agent: consumes a [`Task`] and produces artifacts on disk.
///
/// Every role implements the same single operation. Failure is signalled by
/// returning `Err`, never by a sentinel value; the orchestrator treats every
/// error the same way regardless of where it came from.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The role this agent serves.
    fn role(&self) -> AgentRole;

    /// Run the task and return the paths of the artifacts written.
    async fn run_task(&self, task: &Task) -> AgentpipeResult<Vec<PathBuf>>;
}
