//! The retrieval collaborator interface consumed by the orchestrator.
//!
//! `Retriever::search` returns ranked document fragments for a query and has
//! no side effects. The reference implementation embeds the query and walks
//! the in-memory [`ChunkIndex`]; a production deployment substitutes a real
//! vector store behind the same trait.

use std::sync::Arc;

use crate::embedding::{DynEmbedder, Embedder};
use crate::error::RetrievalError;
use crate::index::ChunkIndex;

/// One retrieved document fragment with its source label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
}

/// Retrieval engine interface.
pub trait Retriever: Send + Sync {
    /// Return document chunks relevant to the query, best first.
    fn search(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<Vec<RetrievedChunk>, RetrievalError>> + Send;
}

/// Object-safe version of [`Retriever`] for dynamic dispatch.
pub trait DynRetriever: Send + Sync {
    fn search_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<RetrievedChunk>, RetrievalError>> + Send + 'a>,
    >;
}

impl<T: Retriever> DynRetriever for T {
    fn search_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<RetrievedChunk>, RetrievalError>> + Send + 'a>,
    > {
        Box::pin(self.search(query))
    }
}

/// Reference retriever over the in-memory index.
pub struct IndexRetriever<E: Embedder> {
    index: Arc<ChunkIndex>,
    embedder: E,
    top_k: usize,
}

impl<E: Embedder> IndexRetriever<E> {
    pub fn new(index: Arc<ChunkIndex>, embedder: E, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }

    /// Embed and insert a document chunk into the shared index.
    pub async fn ingest(
        &self,
        text: &str,
        source: &str,
    ) -> Result<(), RetrievalError> {
        let embedding = self.embedder.embed(text).await?;
        self.index.insert(embedding, text, source)
    }
}

impl<E: Embedder> Retriever for IndexRetriever<E> {
    async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let query_vec = self.embedder.embed(query).await?;
        let hits = self.index.search(&query_vec, self.top_k)?;
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                text: hit.text,
                source: hit.source,
            })
            .collect())
    }
}
