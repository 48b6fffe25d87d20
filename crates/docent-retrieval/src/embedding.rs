//! Embedding service trait and the deterministic reference implementation.
//!
//! The production embedding backend lives outside this repository; the
//! trait is the seam. `HashEmbedder` provides deterministic hash-based
//! vectors so the index, the server wiring, and tests behave identically
//! from run to run.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::RetrievalError;

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors. Used both
/// when indexing document chunks and when embedding queries.
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, RetrievalError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`Embedder`] for dynamic dispatch.
///
/// Because `Embedder::embed` returns `impl Future` it is not object-safe.
/// This trait uses a boxed future instead, allowing `Box<dyn DynEmbedder>`
/// to be stored in structs without generics. A blanket implementation is
/// provided so that every `Embedder` automatically implements it.
pub trait DynEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, RetrievalError>> + Send + 'a>,
    >;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: Embedder> DynEmbedder for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, RetrievalError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        Embedder::dimensions(self)
    }
}

/// Deterministic hash-based embedder.
///
/// Each whitespace token is hashed into a bucket of the output vector; the
/// result is L2-normalized. Not semantically meaningful, but stable across
/// runs and discriminative enough for ranking tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dimensions: 128 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        if self.dimensions == 0 {
            return Err(RetrievalError::Embedding(
                "embedder has zero dimensions".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash as usize) % self.dimensions;
            // Sign comes from a high bit so similar token sets cancel less.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
