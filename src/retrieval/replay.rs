//! Replay of recorded retrieval results
//!
//! Serves candidate sets captured from a live chunk store, so rankings can be
//! reproduced and thresholds tuned offline.

use crate::error::{Result, StoryfindError};
use crate::retrieval::{
    BackendError, EmbeddingProvider, RetrievalBackend, RetrievalCandidate, SearchScope,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Candidate sets recorded per retrieval mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordedCandidates {
    #[serde(default)]
    pub lexical: Vec<RetrievalCandidate>,

    #[serde(default)]
    pub semantic: Vec<RetrievalCandidate>,
}

impl RecordedCandidates {
    /// Load a JSON recording from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StoryfindError::Io {
            source: e,
            context: format!("Failed to read candidates file: {:?}", path),
        })?;

        serde_json::from_str(&content).map_err(|e| StoryfindError::Json {
            source: e,
            context: format!("Failed to parse candidates file: {:?}", path),
        })
    }
}

/// Retrieval backend answering from a recording
///
/// Applies scope filters, orders by raw score descending and pages with
/// offset/limit the way a live store would.
pub struct ReplayBackend {
    recorded: RecordedCandidates,
}

impl ReplayBackend {
    pub fn new(recorded: RecordedCandidates) -> Self {
        Self { recorded }
    }

    fn page(
        candidates: &[RetrievalCandidate],
        scope: &SearchScope,
        limit: usize,
        offset: usize,
    ) -> Vec<RetrievalCandidate> {
        let filter = scope.to_filter();

        let mut matching: Vec<&RetrievalCandidate> = candidates
            .iter()
            .filter(|c| filter.as_ref().map_or(true, |f| f.matches(c)))
            .collect();
        matching.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score));

        matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RetrievalBackend for ReplayBackend {
    async fn lexical_search(
        &self,
        query: &str,
        scope: &SearchScope,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<RetrievalCandidate>, BackendError> {
        tracing::debug!("Replaying lexical results for '{}'", query);
        Ok(Self::page(&self.recorded.lexical, scope, limit, offset))
    }

    async fn semantic_search(
        &self,
        _vector: &[f32],
        scope: &SearchScope,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<RetrievalCandidate>, BackendError> {
        Ok(Self::page(&self.recorded.semantic, scope, limit, offset))
    }
}

/// Embedding provider returning one fixed vector
pub struct FixedEmbedder {
    vector: Vec<f32>,
    model_name: String,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            model_name: String::from("fixed"),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, BackendError> {
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.vector.len())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
