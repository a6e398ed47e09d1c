//! Core types and error definitions for the agentpipe framework.
//!
//! This crate provides the foundational types shared across all agentpipe crates:
//! the unit of work routed between agents, the contract every agent implements,
//! and the unified error type.
//!
//! # Main types
//!
//! - [`AgentpipeError`]: Unified error enum for all agentpipe subsystems.
//! - [`AgentpipeResult`]: Convenience alias for `Result<T, AgentpipeError>`.
//! - [`Task`]: A unit of work owned by one agent role.
//! - [`TaskKey`]: The identity tuple used for deduplication and completion matching.
//! - [`AgentRole`]: The closed set of agent roles in the pipeline.
//! - [`Agent`]: The single-operation contract every agent exposes.

/// The agent contract.
pub mod agent;
/// Task, task identity, and agent roles.
pub mod task;

pub use agent::Agent;
pub use task::{AgentRole, Task, TaskKey, TaskOutcome};

// --- Error types ---

/// Top-level error type for the agentpipe framework.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentpipeError {
    /// An error raised by an agent while running a task.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error reading or writing the task store.
    #[error("Store error: {0}")]
    Store(String),

    /// An error while reading an architecture plan.
    #[error("Plan error: {0}")]
    Plan(String),

    /// An error from the memory graph or its vector index.
    #[error("Memory error: {0}")]
    Memory(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external call exceeded its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`AgentpipeError`].
pub type AgentpipeResult<T> = Result<T, AgentpipeError>;
