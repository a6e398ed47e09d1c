pub mod claude;
pub mod openai;

use agentpipe_core::{AgentpipeError, AgentpipeResult};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for LLM provider backends.
///
/// Each provider implements this to handle API communication. Failures
/// (timeout, quota, malformed response) are returned as errors.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete a single user prompt.
    async fn complete(&self, prompt: &str, model: &str, temperature: f32)
        -> AgentpipeResult<String>;
}

pub(crate) fn http_client(timeout: Duration) -> AgentpipeResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentpipeError::Http(format!("Failed to build HTTP client: {e}")))
}

pub(crate) fn map_send_error(e: reqwest::Error, timeout: Duration) -> AgentpipeError {
    if e.is_timeout() {
        AgentpipeError::Timeout(timeout)
    } else {
        AgentpipeError::Http(e.to_string())
    }
}
