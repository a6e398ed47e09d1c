use agentpipe_core::AgentpipeResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> AgentpipeResult<Vec<f32>>;

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Feature-hashing embedding over lowercase word and identifier-part tokens.
///
/// Identifiers such as `load_csv_rows` contribute the whole identifier plus
/// each part, so code and prose about the same thing land near each other.
/// Each token is hashed to one bucket with a hash-derived sign, then the
/// vector is L2-normalized. Text without tokens embeds to the zero vector.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> AgentpipeResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        let counts = tokenize(text);
        if counts.is_empty() {
            return Ok(vector);
        }

        for (token, count) in &counts {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            // Sublinear term frequency keeps long files from drowning rare terms.
            vector[bucket] += sign * (1.0 + (*count as f32).ln());
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn tokenize(text: &str) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    let lowered = text.to_lowercase();
    for word in lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.len() > 1)
    {
        *counts.entry(word.to_string()).or_insert(0) += 1;
        if word.contains('_') {
            for part in word.split('_').filter(|p| p.len() > 1) {
                *counts.entry(part.to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// 64-bit FNV-1a.
fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
