use crate::index::{Metadata, VectorIndex, ID_KEY};
use agentpipe_core::{AgentpipeError, AgentpipeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const TEXT_KEY: &str = "text";
const TIMESTAMP_KEY: &str = "timestamp";
const SALIENCE_KEY: &str = "salience";

/// A durable unit of contextual memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub salience: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MemoryNode {
    /// The metadata record stored alongside the text in the vector index.
    /// Reserved keys override caller metadata of the same name.
    fn index_metadata(&self) -> Metadata {
        let mut record = self.metadata.clone();
        record.insert(ID_KEY.to_string(), serde_json::json!(self.id));
        record.insert(TEXT_KEY.to_string(), serde_json::json!(self.text));
        record.insert(
            TIMESTAMP_KEY.to_string(),
            serde_json::json!(self.timestamp.to_rfc3339()),
        );
        record.insert(SALIENCE_KEY.to_string(), serde_json::json!(self.salience));
        record
    }
}

/// Directed, unweighted link between two memories. Parallel edges are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEdge {
    pub src: String,
    pub dst: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A similarity-search result. Lower `score` means more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHit {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Counts from a [`MemoryGraph::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Index documents deleted: those with no matching graph node, plus
    /// every copy of an id the index holds more than once.
    pub removed_from_index: usize,
    /// Graph nodes re-added because the index lost them or held duplicates.
    pub reindexed: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GraphState {
    /// Next id to hand out. Never decreases, so pruned ids are not reused.
    next_id: u64,
    nodes: BTreeMap<String, MemoryNode>,
    edges: Vec<MemoryEdge>,
}

impl GraphState {
    fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.src == id)
            .map(|e| e.dst.as_str())
    }

    fn require(&self, id: &str) -> AgentpipeResult<&MemoryNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| AgentpipeError::NotFound(format!("memory node {id}")))
    }
}

/// Hybrid memory: a directed link graph plus a vector index, keyed by node id.
///
/// The two stores are not transactionally coupled. `add_memory` persists the
/// advanced id counter before the index sees the new id, so a crash cannot
/// hand the same id out twice. `prune` touches the graph only after the index
/// delete succeeded. [`MemoryGraph::reconcile`] repairs any drift left by a
/// crash between the two steps.
pub struct MemoryGraph {
    index: Arc<dyn VectorIndex>,
    state: RwLock<GraphState>,
    path: Option<PathBuf>,
}

impl MemoryGraph {
    /// Create an empty, non-persistent graph over `index`.
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            state: RwLock::new(GraphState::default()),
            path: None,
        }
    }

    /// Open a graph persisted as JSON at `path`, creating it on first write.
    ///
    /// The id counter starts past every numeric id already in `index`, so
    /// entries written by a run that crashed before saving the graph are never
    /// shadowed by new memories.
    pub async fn open(path: PathBuf, index: Arc<dyn VectorIndex>) -> AgentpipeResult<Self> {
        let mut state: GraphState = if path.exists() {
            let data = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&data).map_err(|e| {
                AgentpipeError::Memory(format!(
                    "Failed to parse memory graph {}: {e}",
                    path.display()
                ))
            })?
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            GraphState::default()
        };

        let floor = index
            .ids()
            .await?
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .map(|n| n + 1)
            .max()
            .unwrap_or(0);
        if floor > state.next_id {
            warn!(
                recorded = state.next_id,
                next_id = floor,
                "Vector index holds ids the graph never recorded"
            );
            state.next_id = floor;
        }

        info!(path = %path.display(), nodes = state.nodes.len(), "Memory graph opened");
        Ok(Self {
            index,
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    async fn persist(&self, state: &GraphState) -> AgentpipeResult<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(state)?;
            tokio::fs::write(path, json).await.map_err(|e| {
                AgentpipeError::Memory(format!("Failed to write memory graph: {e}"))
            })?;
        }
        Ok(())
    }

    /// Add a memory stamped with the current time. Returns the new node id.
    pub async fn add_memory(
        &self,
        text: &str,
        metadata: Metadata,
        salience: f64,
    ) -> AgentpipeResult<String> {
        self.add_memory_at(text, metadata, salience, Utc::now()).await
    }

    /// Add a memory with an explicit creation time.
    pub async fn add_memory_at(
        &self,
        text: &str,
        metadata: Metadata,
        salience: f64,
        timestamp: DateTime<Utc>,
    ) -> AgentpipeResult<String> {
        if !salience.is_finite() || salience < 0.0 {
            return Err(AgentpipeError::Memory(format!(
                "Salience must be a non-negative number, got {salience}"
            )));
        }

        let mut state = self.state.write().await;
        let id = state.next_id.to_string();

        // The id is burnt on disk before the index can hold it.
        state.next_id += 1;
        if let Err(e) = self.persist(&state).await {
            state.next_id -= 1;
            return Err(e);
        }

        let node = MemoryNode {
            id: id.clone(),
            text: text.to_string(),
            timestamp,
            salience,
            metadata,
        };
        let record = node.index_metadata();
        if let Err(e) = self.index.add(vec![text.to_string()], vec![record]).await {
            warn!(id = %id, error = %e, "Vector index rejected memory");
            return Err(e);
        }

        state.nodes.insert(id.clone(), node);
        if let Err(e) = self.persist(&state).await {
            state.nodes.remove(&id);
            if let Err(undo) = self.index.delete(std::slice::from_ref(&id)).await {
                warn!(id = %id, error = %undo, "Could not withdraw memory from the vector index");
            }
            warn!(id = %id, error = %e, "Memory graph not saved, memory rolled back");
            return Err(e);
        }

        debug!(id = %id, salience, "Memory added");
        Ok(id)
    }

    /// Add a directed edge `src -> dst`.
    pub async fn link_memories(
        &self,
        src_id: &str,
        dst_id: &str,
        label: Option<&str>,
    ) -> AgentpipeResult<()> {
        let mut state = self.state.write().await;
        state.require(src_id)?;
        state.require(dst_id)?;
        state.edges.push(MemoryEdge {
            src: src_id.to_string(),
            dst: dst_id.to_string(),
            label: label.map(str::to_string),
        });
        self.persist(&state).await
    }

    /// Similarity search, optionally dropping memories created at or before
    /// `after`. Documents without a readable timestamp are kept. Results keep
    /// the index's ranking order; filtering can return fewer than `k` hits but
    /// never reorders them.
    pub async fn query(
        &self,
        text: &str,
        after: Option<DateTime<Utc>>,
        k: usize,
    ) -> AgentpipeResult<Vec<MemoryHit>> {
        let docs = self.index.search_with_score(text, k).await?;

        let mut hits = Vec::with_capacity(docs.len());
        for doc in docs {
            if let Some(cutoff) = after {
                let created = doc
                    .metadata
                    .get(TIMESTAMP_KEY)
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc));
                if created.is_some_and(|ts| ts <= cutoff) {
                    continue;
                }
            }

            let Some(id) = doc.metadata.get(ID_KEY).and_then(|v| v.as_str()) else {
                warn!("Index returned a document without an id, skipping");
                continue;
            };
            hits.push(MemoryHit {
                id: id.to_string(),
                text: doc.text,
                score: doc.score,
            });
        }
        Ok(hits)
    }

    /// Remove every memory with `salience < min_salience` from both stores,
    /// plus every edge touching it. Returns the removed ids.
    pub async fn prune(&self, min_salience: f64) -> AgentpipeResult<Vec<String>> {
        let mut state = self.state.write().await;

        // Qualifying ids are fixed before anything is removed.
        let doomed: Vec<String> = state
            .nodes
            .values()
            .filter(|n| n.salience < min_salience)
            .map(|n| n.id.clone())
            .collect();
        if doomed.is_empty() {
            return Ok(doomed);
        }

        self.index.delete(&doomed).await?;

        let doomed_set: HashSet<&str> = doomed.iter().map(String::as_str).collect();
        state.nodes.retain(|id, _| !doomed_set.contains(id.as_str()));
        state.edges.retain(|e| {
            !doomed_set.contains(e.src.as_str()) && !doomed_set.contains(e.dst.as_str())
        });

        self.persist(&state).await?;
        info!(removed = doomed.len(), min_salience, "Memory pruned");
        Ok(doomed)
    }

    /// Breadth-first walk along outgoing edges from `start_id`, at most `hops`
    /// levels deep, visiting each node once. Returns the visited texts joined
    /// by newlines in visitation order.
    pub async fn multi_hop_context(&self, start_id: &str, hops: usize) -> AgentpipeResult<String> {
        let state = self.state.read().await;
        state.require(start_id)?;

        let mut context: Vec<&str> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([start_id]);
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::from([(start_id, 0)]);

        while let Some((id, depth)) = frontier.pop_front() {
            if let Some(node) = state.nodes.get(id) {
                context.push(&node.text);
            }
            if depth >= hops {
                continue;
            }
            for next in state.successors(id) {
                if visited.insert(next) {
                    frontier.push_back((next, depth + 1));
                }
            }
        }

        Ok(context.join("\n"))
    }

    /// Update the salience of an existing memory.
    pub async fn set_salience(&self, id: &str, salience: f64) -> AgentpipeResult<()> {
        if !salience.is_finite() || salience < 0.0 {
            return Err(AgentpipeError::Memory(format!(
                "Salience must be a non-negative number, got {salience}"
            )));
        }
        let mut state = self.state.write().await;
        let node = state
            .nodes
            .get_mut(id)
            .ok_or_else(|| AgentpipeError::NotFound(format!("memory node {id}")))?;
        node.salience = salience;
        self.persist(&state).await
    }

    /// Bring the vector index back in line with the graph.
    pub async fn reconcile(&self) -> AgentpipeResult<ReconcileReport> {
        let state = self.state.read().await;
        let mut copies: HashMap<String, usize> = HashMap::new();
        for id in self.index.ids().await? {
            *copies.entry(id).or_default() += 1;
        }

        // A duplicated id cannot be told apart by id alone: drop every copy
        // and re-index the graph's version below.
        let stale: Vec<String> = copies
            .iter()
            .filter(|(id, count)| **count > 1 || !state.nodes.contains_key(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect();
        let removed_from_index = if stale.is_empty() {
            0
        } else {
            self.index.delete(&stale).await?
        };

        let missing: Vec<&MemoryNode> = state
            .nodes
            .values()
            .filter(|n| copies.get(&n.id).map_or(true, |count| *count > 1))
            .collect();
        let reindexed = missing.len();
        if !missing.is_empty() {
            let texts = missing.iter().map(|n| n.text.clone()).collect();
            let records = missing.iter().map(|n| n.index_metadata()).collect();
            self.index.add(texts, records).await?;
        }

        if removed_from_index > 0 || reindexed > 0 {
            warn!(removed_from_index, reindexed, "Memory stores were out of sync, repaired");
        }
        Ok(ReconcileReport {
            removed_from_index,
            reindexed,
        })
    }

    /// A copy of the node with this id.
    pub async fn get(&self, id: &str) -> Option<MemoryNode> {
        self.state.read().await.nodes.get(id).cloned()
    }

    /// Outgoing edges of `id`, in insertion order.
    pub async fn links_from(&self, id: &str) -> Vec<MemoryEdge> {
        let state = self.state.read().await;
        state.edges.iter().filter(|e| e.src == id).cloned().collect()
    }

    /// Number of memories in the graph.
    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    /// Whether the graph holds no memories.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.nodes.is_empty()
    }
}
