use crate::embedding::EmbeddingProvider;
use agentpipe_core::{AgentpipeError, AgentpipeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metadata attached to an indexed document.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Metadata key every indexed document must carry.
pub const ID_KEY: &str = "id";

/// A search hit. Lower `score` means more similar.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Similarity-search backend used by the memory graph.
///
/// Documents are identified by the string `id` in their metadata.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add documents; `texts` and `metadatas` are parallel.
    async fn add(&self, texts: Vec<String>, metadatas: Vec<Metadata>) -> AgentpipeResult<()>;

    /// Up to `k` documents ranked by ascending distance to `query`.
    async fn search_with_score(&self, query: &str, k: usize)
        -> AgentpipeResult<Vec<ScoredDocument>>;

    /// Delete every document whose id is in `ids`. Returns how many were removed.
    async fn delete(&self, ids: &[String]) -> AgentpipeResult<usize>;

    /// Ids of every stored document.
    async fn ids(&self) -> AgentpipeResult<Vec<String>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    id: String,
    text: String,
    embedding: Vec<f32>,
    metadata: Metadata,
}

/// Brute-force index: embeds on insert, scans on search.
/// Distance is `1 - cosine similarity`, so identical direction scores 0.
pub struct InMemoryVectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    async fn embed_entries(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> AgentpipeResult<Vec<IndexEntry>> {
        if texts.len() != metadatas.len() {
            return Err(AgentpipeError::Memory(format!(
                "{} texts but {} metadata records",
                texts.len(),
                metadatas.len()
            )));
        }

        let mut entries = Vec::with_capacity(texts.len());
        for (text, metadata) in texts.into_iter().zip(metadatas) {
            let id = metadata
                .get(ID_KEY)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AgentpipeError::Memory("Indexed document is missing a string id".to_string())
                })?
                .to_string();
            let embedding = self.embedder.embed(&text).await?;
            entries.push(IndexEntry {
                id,
                text,
                embedding,
                metadata,
            });
        }
        Ok(entries)
    }

    async fn insert_entries(&self, new_entries: Vec<IndexEntry>) {
        let mut entries = self.entries.write().await;
        entries.extend(new_entries);
    }

    async fn snapshot(&self) -> Vec<IndexEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add(&self, texts: Vec<String>, metadatas: Vec<Metadata>) -> AgentpipeResult<()> {
        let entries = self.embed_entries(texts, metadatas).await?;
        self.insert_entries(entries).await;
        Ok(())
    }

    async fn search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> AgentpipeResult<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed(query).await?;

        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredDocument> = entries
            .iter()
            .map(|e| ScoredDocument {
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                score: 1.0 - cosine_similarity(&query_embedding, &e.embedding),
            })
            .collect();

        // Stable sort: equal distances keep insertion order.
        scored.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn delete(&self, ids: &[String]) -> AgentpipeResult<usize> {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !doomed.contains(e.id.as_str()));
        Ok(before - entries.len())
    }

    async fn ids(&self) -> AgentpipeResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().map(|e| e.id.clone()).collect())
    }
}

/// File-backed index that persists entries (with their embeddings) as JSONL.
/// Loads everything on open; appends on add; rewrites on delete.
pub struct FileVectorIndex {
    path: PathBuf,
    inner: InMemoryVectorIndex,
}

impl FileVectorIndex {
    /// Open the index at `path`, loading any existing entries.
    pub async fn open(
        path: PathBuf,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AgentpipeResult<Self> {
        let inner = InMemoryVectorIndex::new(embedder);

        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                AgentpipeError::Memory(format!("Failed to read vector index: {e}"))
            })?;
            let mut loaded = Vec::new();
            for (lineno, line) in data.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: IndexEntry = serde_json::from_str(line).map_err(|e| {
                    AgentpipeError::Memory(format!(
                        "Invalid index entry at line {}: {e}",
                        lineno + 1
                    ))
                })?;
                loaded.push(entry);
            }
            inner.insert_entries(loaded).await;
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(Self { path, inner })
    }

    async fn append_to_file(&self, entries: &[IndexEntry]) -> AgentpipeResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut data = String::new();
        for entry in entries {
            data.push_str(&serde_json::to_string(entry)?);
            data.push('\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AgentpipeError::Memory(format!("Failed to open vector index: {e}")))?;
        file.write_all(data.as_bytes())
            .await
            .map_err(|e| AgentpipeError::Memory(format!("Failed to write vector index: {e}")))?;
        Ok(())
    }

    async fn rewrite_file(&self) -> AgentpipeResult<()> {
        let mut data = String::new();
        for entry in &self.inner.snapshot().await {
            data.push_str(&serde_json::to_string(entry)?);
            data.push('\n');
        }
        tokio::fs::write(&self.path, data.as_bytes())
            .await
            .map_err(|e| AgentpipeError::Memory(format!("Failed to write vector index: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FileVectorIndex {
    async fn add(&self, texts: Vec<String>, metadatas: Vec<Metadata>) -> AgentpipeResult<()> {
        let entries = self.inner.embed_entries(texts, metadatas).await?;
        self.append_to_file(&entries).await?;
        self.inner.insert_entries(entries).await;
        Ok(())
    }

    async fn search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> AgentpipeResult<Vec<ScoredDocument>> {
        self.inner.search_with_score(query, k).await
    }

    async fn delete(&self, ids: &[String]) -> AgentpipeResult<usize> {
        let removed = self.inner.delete(ids).await?;
        if removed > 0 {
            self.rewrite_file().await?;
        }
        Ok(removed)
    }

    async fn ids(&self) -> AgentpipeResult<Vec<String>> {
        self.inner.ids().await
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::embedding::LocalEmbedding;

    fn meta(id: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert(ID_KEY.to_string(), serde_json::json!(id));
        m
    }

    fn index() -> InMemoryVectorIndex {
        InMemoryVectorIndex::new(Arc::new(LocalEmbedding::default()))
    }

    #[tokio::test]
    async fn test_add_and_ids() {
        let idx = index();
        idx.add(
            vec!["alpha".into(), "beta".into()],
            vec![meta("0"), meta("1")],
        )
        .await
        .unwrap();
        assert_eq!(idx.ids().await.unwrap(), vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_add_rejects_mismatched_lengths() {
        let idx = index();
        let err = idx.add(vec!["a".into()], vec![]).await.unwrap_err();
        assert!(matches!(err, AgentpipeError::Memory(_)));
    }

    #[tokio::test]
    async fn test_add_requires_id() {
        let idx = index();
        assert!(idx.add(vec!["a".into()], vec![Metadata::new()]).await.is_err());
        assert!(idx.ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_ascending_distance() {
        let idx = index();
        idx.add(
            vec![
                "render the login page".into(),
                "parse csv rows from disk".into(),
            ],
            vec![meta("0"), meta("1")],
        )
        .await
        .unwrap();

        let hits = idx.search_with_score("parse csv rows", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "parse csv rows from disk");
        assert!(hits[0].score <= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_respects_k() {
        let idx = index();
        let texts: Vec<String> = (0..6).map(|i| format!("note number {i}")).collect();
        let metas = (0..6).map(|i| meta(&i.to_string())).collect();
        idx.add(texts, metas).await.unwrap();

        assert_eq!(idx.search_with_score("note", 3).await.unwrap().len(), 3);
        assert!(idx.search_with_score("note", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let idx = index();
        idx.add(vec!["a1".into(), "b2".into()], vec![meta("0"), meta("1")])
            .await
            .unwrap();
        assert_eq!(idx.delete(&["0".to_string(), "9".to_string()]).await.unwrap(), 1);
        assert_eq!(idx.ids().await.unwrap(), vec!["1"]);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_file_index_persists_and_rewrites() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("vectors.jsonl");
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbedding::default());

        {
            let idx = FileVectorIndex::open(path.clone(), embedder.clone())
                .await
                .unwrap();
            idx.add(
                vec!["keep me".into(), "drop me".into()],
                vec![meta("0"), meta("1")],
            )
            .await
            .unwrap();
            assert_eq!(idx.delete(&["1".to_string()]).await.unwrap(), 1);
        }

        let reopened = FileVectorIndex::open(path, embedder).await.unwrap();
        assert_eq!(reopened.ids().await.unwrap(), vec!["0"]);
        let hits = reopened.search_with_score("keep", 1).await.unwrap();
        assert_eq!(hits[0].text, "keep me");
    }

    #[tokio::test]
    async fn test_file_index_rejects_corrupt_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vectors.jsonl");
        tokio::fs::write(&path, "{not json}\n").await.unwrap();
        let result = FileVectorIndex::open(path, Arc::new(LocalEmbedding::default())).await;
        assert!(result.is_err());
    }
}
