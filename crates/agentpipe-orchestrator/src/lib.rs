//! The agentpipe task orchestration engine.
//!
//! A persistent, deduplicated task store drives role agents one task at a
//! time. Architect and coder tasks grow the store: an architecture plan is
//! parsed into coding and testing tasks, and every coding task queues a
//! refactor and a documentation task.
//!
//! # Main types
//!
//! - [`Orchestrator`]: The dispatch loop over a [`TaskStore`] and an [`AgentRegistry`].
//! - [`TaskStore`]: Ordered task list persisted as a JSON array.
//! - [`AgentRegistry`]: One agent per role, validated at startup.
//! - [`AgentMonitor`]: Per-role counters reported at the end of a run.

/// Dispatch loop and follow-up task expansion.
pub mod engine;
/// Per-role run metrics.
pub mod monitor;
/// Architecture plan parsing.
pub mod plan_parser;
/// Role to agent lookup.
pub mod registry;
/// Persistent task list.
pub mod task_store;

pub use engine::{coder_follow_ups, Orchestrator, OrchestratorConfig, RunOutcome, RunReport};
pub use monitor::{AgentMonitor, RoleMetrics};
pub use plan_parser::{missing_sections, parse_plan, parse_plan_file};
pub use registry::AgentRegistry;
pub use task_store::TaskStore;
