//! LLM access and the role agents that drive the agentpipe pipeline.
//!
//! # Main types
//!
//! - [`LlmClient`]: Dispatches `complete(prompt, model, temperature)` to a provider backend.
//! - [`ModelConfig`]: Provider, credentials, and request deadline.
//! - [`Profiles`]: Model id and temperature per agent role.
//! - [`OutputLayout`]: Where each role reads and writes its artifacts.
//! - [`ArchitectAgent`], [`CoderAgent`], [`SourceAgent`]: The role agents.

pub mod backends;
pub mod config;
pub mod layout;
pub mod llm;
pub mod profiles;
pub mod roles;

pub use config::{LlmProvider, ModelConfig};
pub use layout::OutputLayout;
pub use llm::LlmClient;
pub use profiles::{Profiles, RoleProfile};
pub use roles::{build_agents, ArchitectAgent, CoderAgent, SourceAgent};
