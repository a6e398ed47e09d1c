use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI or any server speaking the chat completions API.
    #[default]
    OpenAi,
    Claude,
}

impl LlmProvider {
    /// Environment variable consulted when no key is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Deadline for a single completion request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: String::new(),
            api_base_url: None,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::Claude => "https://api.anthropic.com",
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fill an empty `api_key` from the provider's environment variable.
    pub fn with_env_key(mut self) -> Self {
        if self.api_key.is_empty() {
            if let Ok(key) = std::env::var(self.provider.api_key_env()) {
                self.api_key = key;
            }
        }
        self
    }
}
