use crate::backends::claude::ClaudeBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::CompletionBackend;
use crate::config::{LlmProvider, ModelConfig};
use agentpipe_core::AgentpipeResult;
use std::time::Instant;
use tracing::debug;

/// LLM client that dispatches to the configured provider backend.
///
/// To add a new provider: implement `CompletionBackend` in `backends/` and wire it here.
pub struct LlmClient {
    backend: Box<dyn CompletionBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> AgentpipeResult<Self> {
        let backend: Box<dyn CompletionBackend> = match config.provider {
            LlmProvider::OpenAi => Box::new(OpenAiBackend::new(config)?),
            LlmProvider::Claude => Box::new(ClaudeBackend::new(config)?),
        };
        Ok(Self { backend })
    }

    /// Create from a pre-built backend (tests, custom providers).
    pub fn from_backend(backend: Box<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Single-prompt text completion.
    pub async fn complete(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> AgentpipeResult<String> {
        let start = Instant::now();
        let text = self.backend.complete(prompt, model, temperature).await?;
        debug!(
            model,
            prompt_chars = prompt.len(),
            response_chars = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );
        Ok(text)
    }
}
