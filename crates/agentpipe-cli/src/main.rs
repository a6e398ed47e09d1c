mod config;

use agentpipe_agent::{build_agents, LlmClient, Profiles};
use agentpipe_core::{AgentRole, Task};
use agentpipe_memory::{FileVectorIndex, LocalEmbedding, MemoryGraph};
use agentpipe_orchestrator::{AgentRegistry, Orchestrator, TaskStore};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use config::{AgentpipeConfig, PathsConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agentpipe", about = "agentpipe: LLM agent task pipeline", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "agentpipe.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Also append logs to this file (overrides `[logging] file`)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Process pending tasks until the queue is drained
    Run {
        /// Stop after this many tasks (overrides config)
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Pause between tasks in milliseconds (overrides config)
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Manage the task queue
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Inspect and maintain the memory graph
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Queue a task
    Add {
        /// Agent role, e.g. architect, coding, "QA Agent"
        #[arg(long)]
        agent: AgentRole,
        #[arg(long)]
        description: String,
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    /// List tasks in dispatch order
    List,
    /// Remove the task at an index shown by `task list`
    Remove { index: usize },
    /// Mark every task pending again
    Reset,
    /// Remove every task
    Clear,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Similarity search over stored memories
    Query {
        text: String,
        /// Only memories created after this RFC 3339 time
        #[arg(long)]
        after: Option<DateTime<Utc>>,
        #[arg(short, default_value_t = 5)]
        k: usize,
    },
    /// Remove memories below a salience threshold
    Prune {
        #[arg(long, default_value_t = 0.3)]
        min_salience: f64,
    },
    /// Text reachable from a memory within a number of links
    Context {
        id: String,
        #[arg(long, default_value_t = 2)]
        hops: usize,
    },
    /// Repair drift between the graph and the vector index
    Reconcile,
}

fn init_tracing(format: LogFormat, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open log file '{}': {}", path.display(), e))?;
            BoxMakeWriter::new(std::io::stderr.and(Arc::new(file)))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(log_file.is_none())
        .with_writer(writer);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn open_memory(paths: &PathsConfig) -> anyhow::Result<Arc<MemoryGraph>> {
    let index = FileVectorIndex::open(
        paths.vector_store.clone(),
        Arc::new(LocalEmbedding::default()),
    )
    .await?;
    let graph = MemoryGraph::open(paths.memory_graph.clone(), Arc::new(index)).await?;
    Ok(Arc::new(graph))
}

fn print_task(index: usize, task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    print!("{index:>3} [{mark}] {}: {}", task.agent.display_name(), task.description);
    if let Some(input) = &task.input_file {
        print!("  <- {input}");
    }
    if let Some(output) = &task.output_file {
        print!("  -> {output}");
    }
    println!();
    if let Some(outcome) = &task.outcome {
        println!("        {}", serde_json::to_string(outcome).unwrap_or_default());
    }
}

async fn run(
    config: AgentpipeConfig,
    max_iterations: Option<usize>,
    delay_ms: Option<u64>,
) -> anyhow::Result<()> {
    let mut pipeline = config.pipeline.orchestrator();
    if max_iterations.is_some() {
        pipeline.max_iterations = max_iterations;
    }
    if let Some(ms) = delay_ms {
        pipeline.iteration_delay = std::time::Duration::from_millis(ms);
    }

    let model = config.model.with_env_key();
    if model.api_key.is_empty() {
        anyhow::bail!(
            "No API key: set model.api_key or {}",
            model.provider.api_key_env()
        );
    }
    let profiles = Profiles::new(model.provider).with_named_overrides(&config.profiles)?;
    let llm = Arc::new(LlmClient::new(model)?);
    let memory = open_memory(&config.paths).await?;

    let registry: AgentRegistry = build_agents(llm, &profiles, &config.paths.layout, memory)
        .into_iter()
        .collect();
    let store = TaskStore::open(&config.pipeline.task_file);
    if store.pending_count() == 0 {
        info!("No pending tasks");
        return Ok(());
    }

    let mut orchestrator = Orchestrator::new(store, registry, pipeline)?;
    let report = orchestrator.run().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn task_command(config: &AgentpipeConfig, action: TaskAction) -> anyhow::Result<()> {
    let mut store = TaskStore::open(&config.pipeline.task_file);
    match action {
        TaskAction::Add {
            agent,
            description,
            input,
            output,
        } => {
            let mut task = Task::new(agent, description);
            task.input_file = input;
            task.output_file = output;
            let key = task.key().to_string();
            if store.add(task) {
                println!("Added: {key}");
            } else {
                println!("Already queued: {key}");
            }
        }
        TaskAction::List => {
            if store.is_empty() {
                println!("No tasks.");
            }
            for (index, task) in store.list().iter().enumerate() {
                print_task(index, task);
            }
            println!(
                "\n{} pending, {} completed",
                store.pending_count(),
                store.completed_count()
            );
            if !store.unrecognized().is_empty() {
                println!(
                    "{} record(s) with an unknown agent are kept but never run",
                    store.unrecognized().len()
                );
            }
        }
        TaskAction::Remove { index } => {
            let task = store.remove(index)?;
            println!("Removed: {}", task.key());
        }
        TaskAction::Reset => {
            let reset = store.reset_all();
            println!("Reset {reset} completed task(s)");
        }
        TaskAction::Clear => {
            store.clear();
            println!("Task queue cleared");
        }
    }
    Ok(())
}

async fn memory_command(config: &AgentpipeConfig, action: MemoryAction) -> anyhow::Result<()> {
    let memory = open_memory(&config.paths).await?;
    match action {
        MemoryAction::Query { text, after, k } => {
            let hits = memory.query(&text, after, k).await?;
            if hits.is_empty() {
                println!("No matching memories.");
            }
            for hit in hits {
                println!("[{}] score={:.4}", hit.id, hit.score);
                println!("{}\n", hit.text);
            }
        }
        MemoryAction::Prune { min_salience } => {
            let removed = memory.prune(min_salience).await?;
            println!("Pruned {} memories", removed.len());
            for id in removed {
                println!("  {id}");
            }
        }
        MemoryAction::Context { id, hops } => {
            println!("{}", memory.multi_hop_context(&id, hops).await?);
        }
        MemoryAction::Reconcile => {
            let report = memory.reconcile().await?;
            println!(
                "Index entries removed: {}, memories re-indexed: {}",
                report.removed_from_index, report.reindexed
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AgentpipeConfig::load(&cli.config)?;

    let log_file = cli.log_file.as_deref().or(config.logging.file.as_deref());
    init_tracing(cli.log_format, log_file)?;
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "No config file, using defaults");
    }

    match cli.command {
        Commands::Run {
            max_iterations,
            delay_ms,
        } => run(config, max_iterations, delay_ms).await?,
        Commands::Task { action } => task_command(&config, action)?,
        Commands::Memory { action } => memory_command(&config, action).await?,
    }

    Ok(())
}
