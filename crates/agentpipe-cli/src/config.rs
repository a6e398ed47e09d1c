use agentpipe_agent::{ModelConfig, OutputLayout, RoleProfile};
use agentpipe_orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of `agentpipe.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct AgentpipeConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-role model overrides keyed by role name.
    #[serde(default)]
    pub profiles: HashMap<String, RoleProfile>,
}

#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_task_file")]
    pub task_file: PathBuf,
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            task_file: default_task_file(),
            iteration_delay_ms: default_iteration_delay_ms(),
            max_iterations: None,
            agent_timeout_secs: default_agent_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            iteration_delay: Duration::from_millis(self.iteration_delay_ms),
            max_iterations: self.max_iterations,
            agent_timeout: Duration::from_secs(self.agent_timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// Also append log lines to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    #[serde(flatten)]
    pub layout: OutputLayout,
    #[serde(default = "default_vector_store")]
    pub vector_store: PathBuf,
    #[serde(default = "default_memory_graph")]
    pub memory_graph: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            layout: OutputLayout::default(),
            vector_store: default_vector_store(),
            memory_graph: default_memory_graph(),
        }
    }
}

fn default_task_file() -> PathBuf {
    PathBuf::from("tasks_queue/tasks.json")
}
fn default_iteration_delay_ms() -> u64 {
    1000
}
fn default_agent_timeout_secs() -> u64 {
    300
}
fn default_vector_store() -> PathBuf {
    PathBuf::from("memory/vector_store.jsonl")
}
fn default_memory_graph() -> PathBuf {
    PathBuf::from("memory/memory_graph.json")
}

impl AgentpipeConfig {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use agentpipe_agent::LlmProvider;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AgentpipeConfig = toml::from_str("").unwrap();
        assert_eq!(config.pipeline.task_file, PathBuf::from("tasks_queue/tasks.json"));
        assert_eq!(config.pipeline.iteration_delay_ms, 1000);
        assert!(config.pipeline.max_iterations.is_none());
        assert_eq!(config.paths.layout, OutputLayout::default());
        assert_eq!(config.model.provider, LlmProvider::OpenAi);
        assert!(config.logging.file.is_none());

        let orch = config.pipeline.orchestrator();
        assert_eq!(orch.agent_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_full_config() {
        let config: AgentpipeConfig = toml::from_str(
            r#"
            [model]
            provider = "claude"
            request_timeout_secs = 30

            [pipeline]
            task_file = "queue.json"
            iteration_delay_ms = 0
            max_iterations = 50

            [paths]
            generated_code = "out/src"
            vector_store = "mem/vectors.jsonl"

            [logging]
            file = "logs/agentpipe.log"

            [profiles]
            coding = { model_id = "claude-3-5-sonnet-latest", temperature = 0.1 }
            "#,
        )
        .unwrap();

        assert_eq!(config.model.provider, LlmProvider::Claude);
        assert_eq!(config.pipeline.max_iterations, Some(50));
        assert_eq!(config.paths.layout.generated_code, PathBuf::from("out/src"));
        assert_eq!(config.paths.layout.readme, PathBuf::from("readme"));
        assert_eq!(config.paths.vector_store, PathBuf::from("mem/vectors.jsonl"));
        assert_eq!(config.paths.memory_graph, PathBuf::from("memory/memory_graph.json"));
        assert_eq!(config.profiles["coding"].model_id, "claude-3-5-sonnet-latest");
        assert_eq!(config.logging.file, Some(PathBuf::from("logs/agentpipe.log")));
    }

    #[test]
    fn test_missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AgentpipeConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.pipeline.agent_timeout_secs, 300);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agentpipe.toml");
        std::fs::write(&path, "[pipeline]\niteration_delay_ms = \"soon\"\n").unwrap();
        assert!(AgentpipeConfig::load(&path).is_err());
    }
}
