//! Lifelong contextual memory for pipeline agents.
//!
//! A [`MemoryGraph`] keeps every memory twice: as a node in a directed link
//! graph (for multi-hop traversal and salience pruning) and as a document in
//! a [`VectorIndex`] (for similarity search). Both are keyed by the node id.
//!
//! # Main types
//!
//! - [`MemoryGraph`]: Hybrid vector + symbolic-link memory store.
//! - [`VectorIndex`]: Trait for similarity-search backends.
//! - [`InMemoryVectorIndex`]: Brute-force index over embedded documents.
//! - [`FileVectorIndex`]: JSONL-backed persistent index.
//! - [`LocalEmbedding`]: Hashed bag-of-words embedding, no external API needed.

/// Embedding provider trait and local implementation.
pub mod embedding;
/// Memory graph: nodes, links, pruning, and traversal.
pub mod graph;
/// Vector index trait and in-memory / file-backed implementations.
pub mod index;

pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use graph::{MemoryEdge, MemoryGraph, MemoryHit, MemoryNode, ReconcileReport};
pub use index::{FileVectorIndex, InMemoryVectorIndex, Metadata, ScoredDocument, VectorIndex};
