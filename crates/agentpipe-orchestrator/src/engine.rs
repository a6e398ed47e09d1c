use crate::monitor::{AgentMonitor, RoleMetrics};
use crate::plan_parser::parse_plan_file;
use crate::registry::AgentRegistry;
use crate::task_store::TaskStore;
use agentpipe_core::{AgentRole, AgentpipeError, AgentpipeResult, Task, TaskOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Loop timing and limits.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause between iterations, to rate-limit the model API.
    pub iteration_delay: Duration,
    /// Stop after this many iterations even if tasks remain.
    pub max_iterations: Option<usize>,
    /// Deadline for a single `run_task` call.
    pub agent_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            iteration_delay: Duration::from_millis(1000),
            max_iterations: None,
            agent_timeout: Duration::from_secs(300),
        }
    }
}

/// How [`Orchestrator::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No pending task remained.
    Drained,
    /// `max_iterations` was reached with tasks still pending.
    LimitReached,
}

/// Summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub iterations: usize,
    pub outcome: RunOutcome,
    pub pending: usize,
    pub completed: usize,
    pub metrics: BTreeMap<AgentRole, RoleMetrics>,
}

/// One pass of the loop moves through these states in order; expansion is
/// only reached after a successful dispatch.
enum LoopState {
    Fetch,
    Dispatch(Task),
    Expand(Task, Vec<PathBuf>),
    Complete(Task, TaskOutcome),
    Done,
}

/// Drives pending tasks to their agents until the store is drained.
///
/// Every fetched task is completed exactly once, whether its agent
/// succeeded, failed, timed out, or was never registered. Failed tasks are
/// not retried.
pub struct Orchestrator {
    store: TaskStore,
    registry: AgentRegistry,
    config: OrchestratorConfig,
    monitor: AgentMonitor,
}

impl Orchestrator {
    /// Fails if a registered agent would create tasks for a role with no agent.
    pub fn new(
        store: TaskStore,
        registry: AgentRegistry,
        config: OrchestratorConfig,
    ) -> AgentpipeResult<Self> {
        registry.validate()?;
        info!(roles = ?registry.roles(), "Orchestrator ready");
        Ok(Self {
            store,
            registry,
            config,
            monitor: AgentMonitor::new(),
        })
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    pub fn into_store(self) -> TaskStore {
        self.store
    }

    pub fn monitor(&self) -> &AgentMonitor {
        &self.monitor
    }

    /// Process the next pending task. Returns its outcome, or `None` when
    /// nothing is pending.
    pub async fn run_iteration(&mut self) -> Option<TaskOutcome> {
        let mut state = LoopState::Fetch;
        loop {
            state = match state {
                LoopState::Fetch => match self.store.next_pending() {
                    Some(task) => LoopState::Dispatch(task.clone()),
                    None => LoopState::Done,
                },
                LoopState::Dispatch(task) => self.dispatch(task).await,
                LoopState::Expand(task, outputs) => {
                    self.expand(&task, &outputs);
                    LoopState::Complete(task, TaskOutcome::Succeeded)
                }
                LoopState::Complete(task, outcome) => {
                    self.store.mark_complete(&task.key(), outcome.clone());
                    info!(task = %task.key(), ?outcome, "Task completed");
                    return Some(outcome);
                }
                LoopState::Done => return None,
            };
        }
    }

    /// Loop until no task is pending or the iteration ceiling is hit.
    pub async fn run(&mut self) -> RunReport {
        let start = Instant::now();
        let mut iterations = 0;

        let outcome = loop {
            if self.store.next_pending().is_none() {
                break RunOutcome::Drained;
            }
            if self.config.max_iterations.is_some_and(|max| iterations >= max) {
                warn!(iterations, pending = self.store.pending_count(), "Iteration limit reached");
                break RunOutcome::LimitReached;
            }

            if self.run_iteration().await.is_none() {
                break RunOutcome::Drained;
            }
            iterations += 1;

            if self.store.next_pending().is_some() && !self.config.iteration_delay.is_zero() {
                tokio::time::sleep(self.config.iteration_delay).await;
            }
        };

        info!(
            iterations,
            ?outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "Run finished"
        );
        RunReport {
            iterations,
            outcome,
            pending: self.store.pending_count(),
            completed: self.store.completed_count(),
            metrics: self.monitor.snapshot(),
        }
    }

    async fn dispatch(&mut self, task: Task) -> LoopState {
        let role = task.agent;
        let Some(agent) = self.registry.get(role).cloned() else {
            error!(task = %task.key(), "No agent registered for role, skipping task");
            self.monitor.record_skip(role);
            let reason = format!("no agent registered for {}", role.display_name());
            return LoopState::Complete(task, TaskOutcome::Skipped { reason });
        };

        info!(task = %task.key(), "Dispatching task");
        self.monitor.record_dispatch(role);
        let start = Instant::now();
        let result = tokio::time::timeout(self.config.agent_timeout, agent.run_task(&task))
            .await
            .unwrap_or_else(|_| Err(AgentpipeError::Timeout(self.config.agent_timeout)));

        match result {
            Ok(outputs) => {
                self.monitor.record_success(role, start.elapsed());
                LoopState::Expand(task, outputs)
            }
            Err(e) => {
                error!(task = %task.key(), error = %e, "Agent failed");
                self.monitor.record_failure(role, start.elapsed());
                let reason = e.to_string();
                LoopState::Complete(task, TaskOutcome::Failed { reason })
            }
        }
    }

    fn expand(&mut self, task: &Task, outputs: &[PathBuf]) {
        let follow_ups = match task.agent {
            AgentRole::Architect => match outputs.first() {
                Some(plan) => parse_plan_file(plan),
                None => {
                    warn!(task = %task.key(), "Architect produced no plan, nothing to expand");
                    return;
                }
            },
            AgentRole::Coder => match coder_follow_ups(task) {
                Some(tasks) => Vec::from(tasks),
                None => {
                    warn!(task = %task.key(), "Coding task has no output_file, skipping follow-ups");
                    return;
                }
            },
            AgentRole::Tester | AgentRole::Qa | AgentRole::Refactorer | AgentRole::Documenter => {
                return;
            }
        };

        let offered = follow_ups.len();
        let added = follow_ups
            .into_iter()
            .map(|t| self.store.add(t))
            .filter(|inserted| *inserted)
            .count();
        self.monitor.record_added(task.agent, added);
        info!(task = %task.key(), offered, added, "Follow-up tasks queued");
    }
}

/// The refactor and documentation tasks queued after a coding task.
pub fn coder_follow_ups(task: &Task) -> Option<[Task; 2]> {
    let out = task.output_file.as_deref()?;
    let desc = &task.description;
    Some([
        Task::new(
            AgentRole::Refactorer,
            format!("Refactor and optimize code in {out} ({desc})"),
        )
        .with_input(out)
        .with_output(format!("{out}_refactored.py")),
        Task::new(
            AgentRole::Documenter,
            format!("Generate documentation for {out} ({desc})"),
        )
        .with_input(out)
        .with_output(format!("{out}_docs.md")),
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use agentpipe_core::Agent;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counting {
        role: Option<AgentRole>,
        calls: AtomicUsize,
        fail: bool,
        hang: bool,
    }

    impl Counting {
        fn new(role: AgentRole) -> Self {
            Self {
                role: Some(role),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Agent for Counting {
        fn role(&self) -> AgentRole {
            self.role.unwrap_or(AgentRole::Qa)
        }

        async fn run_task(&self, _task: &Task) -> AgentpipeResult<Vec<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail {
                return Err(AgentpipeError::Http("quota exceeded".into()));
            }
            Ok(vec![PathBuf::from("out")])
        }
    }

    fn fast() -> OrchestratorConfig {
        OrchestratorConfig {
            iteration_delay: Duration::ZERO,
            ..OrchestratorConfig::default()
        }
    }

    fn orchestrator(agents: Vec<Arc<dyn Agent>>, tasks: Vec<Task>) -> Orchestrator {
        let mut store = TaskStore::in_memory();
        for t in tasks {
            store.add(t);
        }
        Orchestrator::new(store, agents.into_iter().collect(), fast()).unwrap()
    }

    #[test]
    fn test_coder_follow_ups() {
        let task = Task::new(AgentRole::Coder, "Implement a.py: parse").with_output("a.py");
        let [refactor, docs] = coder_follow_ups(&task).unwrap();

        assert_eq!(refactor.agent, AgentRole::Refactorer);
        assert_eq!(
            refactor.description,
            "Refactor and optimize code in a.py (Implement a.py: parse)"
        );
        assert_eq!(refactor.input_file.as_deref(), Some("a.py"));
        assert_eq!(refactor.output_file.as_deref(), Some("a.py_refactored.py"));

        assert_eq!(docs.agent, AgentRole::Documenter);
        assert_eq!(docs.input_file.as_deref(), Some("a.py"));
        assert_eq!(docs.output_file.as_deref(), Some("a.py_docs.md"));

        assert!(coder_follow_ups(&Task::new(AgentRole::Coder, "x")).is_none());
    }

    #[test]
    fn test_new_rejects_incomplete_registry() {
        let registry: AgentRegistry = [Arc::new(Counting::new(AgentRole::Coder)) as Arc<dyn Agent>]
            .into_iter()
            .collect();
        assert!(matches!(
            Orchestrator::new(TaskStore::in_memory(), registry, fast()),
            Err(AgentpipeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_store_is_done() {
        let mut orch = orchestrator(Vec::new(), Vec::new());
        assert!(orch.run_iteration().await.is_none());
        let report = orch.run().await;
        assert_eq!(report.iterations, 0);
        assert_eq!(report.outcome, RunOutcome::Drained);
    }

    #[tokio::test]
    async fn test_unregistered_role_is_skipped() {
        let mut orch = orchestrator(Vec::new(), vec![Task::new(AgentRole::Qa, "review")]);
        let outcome = orch.run_iteration().await.unwrap();
        assert!(matches!(outcome, TaskOutcome::Skipped { .. }));
        assert_eq!(orch.store().pending_count(), 0);
        assert_eq!(orch.monitor().get(AgentRole::Qa).unwrap().skipped, 1);
    }

    #[tokio::test]
    async fn test_failure_completes_without_retry() {
        let qa = Arc::new(Counting {
            fail: true,
            ..Counting::new(AgentRole::Qa)
        });
        let mut orch = orchestrator(
            vec![qa.clone() as Arc<dyn Agent>],
            vec![Task::new(AgentRole::Qa, "one"), Task::new(AgentRole::Qa, "two")],
        );

        let report = orch.run().await;
        assert_eq!(report.outcome, RunOutcome::Drained);
        assert_eq!(report.iterations, 2);
        assert_eq!(qa.calls.load(Ordering::SeqCst), 2);
        assert!(orch
            .store()
            .list()
            .iter()
            .all(|t| matches!(t.outcome, Some(TaskOutcome::Failed { .. }))));
        assert_eq!(report.metrics[&AgentRole::Qa].failed, 2);
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let qa = Arc::new(Counting {
            hang: true,
            ..Counting::new(AgentRole::Qa)
        });
        let mut store = TaskStore::in_memory();
        store.add(Task::new(AgentRole::Qa, "slow"));
        let config = OrchestratorConfig {
            agent_timeout: Duration::from_millis(50),
            ..fast()
        };
        let mut orch = Orchestrator::new(store, [qa as Arc<dyn Agent>].into_iter().collect(), config)
            .unwrap();

        let outcome = orch.run_iteration().await.unwrap();
        match outcome {
            TaskOutcome::Failed { reason } => assert!(reason.contains("Timed out"), "{reason}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_coder_expansion_queues_follow_ups() {
        let agents: Vec<Arc<dyn Agent>> = vec![
            Arc::new(Counting::new(AgentRole::Coder)),
            Arc::new(Counting::new(AgentRole::Refactorer)),
            Arc::new(Counting::new(AgentRole::Documenter)),
        ];
        let coding = Task::new(AgentRole::Coder, "Implement a.py: parse").with_output("a.py");
        let mut orch = orchestrator(agents, vec![coding]);

        orch.run_iteration().await;
        assert_eq!(orch.store().len(), 3);
        assert_eq!(orch.store().pending_count(), 2);
        assert_eq!(orch.monitor().get(AgentRole::Coder).unwrap().tasks_added, 2);

        let report = orch.run().await;
        assert_eq!(report.outcome, RunOutcome::Drained);
        assert_eq!(report.completed, 3);
    }

    #[tokio::test]
    async fn test_limit_reached() {
        let qa: Arc<dyn Agent> = Arc::new(Counting::new(AgentRole::Qa));
        let mut store = TaskStore::in_memory();
        for i in 0..5 {
            store.add(Task::new(AgentRole::Qa, format!("review {i}")));
        }
        let config = OrchestratorConfig {
            max_iterations: Some(2),
            ..fast()
        };
        let mut orch = Orchestrator::new(store, [qa].into_iter().collect(), config).unwrap();

        let report = orch.run().await;
        assert_eq!(report.outcome, RunOutcome::LimitReached);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.pending, 3);
    }
}
