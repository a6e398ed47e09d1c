use super::{http_client, map_send_error, CompletionBackend};
use crate::config::ModelConfig;
use agentpipe_core::{AgentpipeError, AgentpipeResult};
use async_trait::async_trait;

/// OpenAI-compatible chat completions backend.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> AgentpipeResult<Self> {
        let http = http_client(config.request_timeout())?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> AgentpipeResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let body = serde_json::json!({
            "model": model,
            "max_tokens": self.config.max_tokens,
            "temperature": temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.request_timeout()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AgentpipeError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(AgentpipeError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// Extract the first choice's message content.
pub fn parse_openai_response(body: &serde_json::Value) -> AgentpipeResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            AgentpipeError::Http(format!("Malformed OpenAI response: {body}"))
        })
}
