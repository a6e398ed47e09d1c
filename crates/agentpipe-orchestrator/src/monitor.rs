use agentpipe_core::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Counters for one agent role over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMetrics {
    /// Tasks handed to the role's agent.
    pub dispatched: u32,
    pub succeeded: u32,
    /// Agent errors and timeouts.
    pub failed: u32,
    /// Tasks completed without running because no agent serves the role.
    pub skipped: u32,
    /// New tasks queued by this role's expansion.
    pub tasks_added: u32,
    pub duration_ms: u64,
}

/// Tracks per-role metrics for the dispatch loop.
#[derive(Debug, Default)]
pub struct AgentMonitor {
    metrics: BTreeMap<AgentRole, RoleMetrics>,
}

impl AgentMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&mut self, role: AgentRole) {
        self.entry(role).dispatched += 1;
    }

    pub fn record_success(&mut self, role: AgentRole, elapsed: Duration) {
        let m = self.entry(role);
        m.succeeded += 1;
        m.duration_ms += elapsed.as_millis() as u64;
    }

    pub fn record_failure(&mut self, role: AgentRole, elapsed: Duration) {
        let m = self.entry(role);
        m.failed += 1;
        m.duration_ms += elapsed.as_millis() as u64;
    }

    pub fn record_skip(&mut self, role: AgentRole) {
        self.entry(role).skipped += 1;
    }

    pub fn record_added(&mut self, role: AgentRole, count: usize) {
        self.entry(role).tasks_added += count as u32;
    }

    /// Metrics for one role, if it has seen any task.
    pub fn get(&self, role: AgentRole) -> Option<&RoleMetrics> {
        self.metrics.get(&role)
    }

    /// Copy of every role's metrics.
    pub fn snapshot(&self) -> BTreeMap<AgentRole, RoleMetrics> {
        self.metrics.clone()
    }

    /// Totals across all roles.
    pub fn aggregate(&self) -> RoleMetrics {
        self.metrics
            .values()
            .fold(RoleMetrics::default(), |mut total, m| {
                total.dispatched += m.dispatched;
                total.succeeded += m.succeeded;
                total.failed += m.failed;
                total.skipped += m.skipped;
                total.tasks_added += m.tasks_added;
                total.duration_ms += m.duration_ms;
                total
            })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "agents": self.metrics,
            "aggregate": self.aggregate(),
        })
    }

    fn entry(&mut self, role: AgentRole) -> &mut RoleMetrics {
        self.metrics.entry(role).or_default()
    }
}
