//! In-memory vector index over loaded documents
//!
//! Documents are split into overlapping word windows, embedded through an
//! [`Embedder`], and searched by cosine similarity.

pub mod query_engine;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::documents::Document;
use crate::ollama::{Embedder, OllamaError};

pub use query_engine::QueryEngine;

/// Chunks embedded per request
const EMBED_BATCH_SIZE: usize = 32;

/// Error type for indexing and retrieval
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] OllamaError),
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidChunking { size: usize, overlap: usize },
}

/// How documents are cut into chunks, measured in whitespace-delimited words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    fn validate(&self) -> Result<(), IndexError> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(IndexError::InvalidChunking {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        Ok(())
    }
}

/// One embedded piece of a document
#[derive(Debug, Clone)]
pub struct Chunk {
    pub source: PathBuf,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A retrieved chunk and its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Embedded chunks plus the embedder used to build them
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Chunk and embed every document
    pub async fn from_documents(
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
        config: ChunkConfig,
    ) -> Result<Self, IndexError> {
        config.validate()?;

        let mut pending: Vec<(PathBuf, String)> = Vec::new();
        for doc in documents {
            for text in split_words(&doc.text, config) {
                pending.push((doc.path.clone(), text));
            }
        }

        let mut chunks = Vec::with_capacity(pending.len());
        for batch in pending.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
            let embeddings = embedder.embed(&texts).await?;
            for ((source, text), embedding) in batch.iter().cloned().zip(embeddings) {
                chunks.push(Chunk {
                    source,
                    text,
                    embedding,
                });
            }
        }

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "Vector index built"
        );
        Ok(Self { chunks, embedder })
    }

    /// Number of chunks in the index
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Return the `top_k` chunks most similar to `query`, best first
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.chunks.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(&query_embedding, &c.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }
}

/// Split text into windows of `chunk_size` words sharing `chunk_overlap` words
fn split_words(text: &str, config: ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let step = config.chunk_size - config.chunk_overlap;
    let mut out = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(words.len());
        out.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    out
}

/// Cosine similarity; 0.0 when either vector is zero or lengths differ
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
