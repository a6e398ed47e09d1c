use super::{http_client, map_send_error, CompletionBackend};
use crate::config::ModelConfig;
use agentpipe_core::{AgentpipeError, AgentpipeResult};
use async_trait::async_trait;

/// Anthropic Messages API backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(config: ModelConfig) -> AgentpipeResult<Self> {
        let http = http_client(config.request_timeout())?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl CompletionBackend for ClaudeBackend {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> AgentpipeResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let body = serde_json::json!({
            "model": model,
            "max_tokens": self.config.max_tokens,
            "temperature": temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
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
                "Claude API error {status}: {resp_body}"
            )));
        }

        parse_claude_response(&resp_body)
    }
}

/// Concatenate the text blocks of a Messages API response.
pub fn parse_claude_response(body: &serde_json::Value) -> AgentpipeResult<String> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| AgentpipeError::Http(format!("Malformed Claude response: {body}")))?;

    let text: Vec<&str> = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();

    if text.is_empty() {
        return Err(AgentpipeError::Http(
            "Claude response contained no text".to_string(),
        ));
    }
    Ok(text.concat())
}
