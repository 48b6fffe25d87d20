//! In-memory vector index with cosine-similarity search.
//!
//! Holds embedded document chunks behind an RwLock; reads dominate, writes
//! happen only at ingest time.

use std::sync::RwLock;

use crate::error::RetrievalError;

/// One embedded document chunk.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub embedding: Vec<f32>,
    pub text: String,
    pub source: String,
}

/// A scored search hit.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub text: String,
    pub source: String,
}

/// In-memory cosine-similarity index.
pub struct ChunkIndex {
    chunks: RwLock<Vec<IndexedChunk>>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Add a chunk with its precomputed embedding.
    pub fn insert(
        &self,
        embedding: Vec<f32>,
        text: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), RetrievalError> {
        let mut chunks = self
            .chunks
            .write()
            .map_err(|e| RetrievalError::Unavailable(format!("index lock poisoned: {}", e)))?;
        chunks.push(IndexedChunk {
            embedding,
            text: text.into(),
            source: source.into(),
        });
        Ok(())
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the `k` chunks most similar to the query vector, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let chunks = self
            .chunks
            .read()
            .map_err(|e| RetrievalError::Unavailable(format!("index lock poisoned: {}", e)))?;

        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .map(|chunk| ScoredChunk {
                score: cosine_similarity(query, &chunk.embedding),
                text: chunk.text.clone(),
                source: chunk.source.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

impl Default for ChunkIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity of two vectors; 0.0 for mismatched or zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_insert_and_len() {
        let index = ChunkIndex::new();
        assert!(index.is_empty());
        index.insert(vec![1.0, 0.0], "chunk one", "doc.pdf").unwrap();
        index.insert(vec![0.0, 1.0], "chunk two", "doc.pdf").unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let index = ChunkIndex::new();
        index.insert(vec![1.0, 0.0], "aligned", "a.pdf").unwrap();
        index.insert(vec![0.0, 1.0], "orthogonal", "b.pdf").unwrap();
        index.insert(vec![0.7, 0.7], "diagonal", "c.pdf").unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "aligned");
        assert_eq!(hits[1].text, "diagonal");
        assert_eq!(hits[2].text, "orthogonal");
    }

    #[test]
    fn test_search_truncates_to_k() {
        let index = ChunkIndex::new();
        for i in 0..10 {
            index
                .insert(vec![1.0, i as f32], format!("chunk {}", i), "doc.pdf")
                .unwrap();
        }
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_search_empty_index() {
        let index = ChunkIndex::new();
        let hits = index.search(&[1.0, 0.0], 5).unwrap();
        assert!(hits.is_empty());
    }
}
