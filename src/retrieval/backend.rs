//! Capabilities the engine consumes: chunk retrieval and query embedding

use crate::retrieval::{RetrievalCandidate, SearchScope};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Chunk store queried by the engine
///
/// Implementations own their connection lifecycle and must tolerate
/// concurrent read-only calls. Scope constraints are combined with AND; see
/// [`SearchScope::to_filter`].
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// BM25 search over transcription text
    async fn lexical_search(
        &self,
        query: &str,
        scope: &SearchScope,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RetrievalCandidate>, BackendError>;

    /// Nearest-neighbour search; `raw_score` carries the native certainty
    async fn semantic_search(
        &self,
        vector: &[f32],
        scope: &SearchScope,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RetrievalCandidate>, BackendError>;
}

/// Query embedding service
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError>;

    /// Expected vector dimension, when known
    fn dimension(&self) -> Option<usize> {
        None
    }

    fn model_name(&self) -> &str;
}
