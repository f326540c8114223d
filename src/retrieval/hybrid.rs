//! Query orchestration across lexical and semantic retrieval

use crate::config::RetrievalConfig;
use crate::retrieval::{
    deduplicate, fuse, normalize_certainty, normalize_min_max, BackendError, EmbeddingProvider,
    FusedCandidate, FusionConfig, RankedResultSet, RetrievalBackend, RetrievalCandidate,
    RetrievalKind, ScoreWindow, SearchMode, SearchQuery, DEFAULT_DEDUP_EPSILON,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailure(String),

    #[error("{kind} retrieval failed: {source}")]
    RetrievalFailure {
        kind: RetrievalKind,
        #[source]
        source: BackendError,
    },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

/// Stateless search entry point combining BM25 and vector retrieval
///
/// Holds no mutable state between calls: every search re-runs retrieval and
/// fusion. Dropping a pending `search` future cancels its in-flight backend
/// calls; discarding out-of-order responses is up to the caller.
pub struct HybridSearcher {
    backend: Arc<dyn RetrievalBackend>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    fusion: FusionConfig,
    dedup_epsilon: f64,
}

impl HybridSearcher {
    /// Create a new searcher from retrieval settings
    pub fn new(
        backend: Arc<dyn RetrievalBackend>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        config: &RetrievalConfig,
    ) -> Result<Self, SearchError> {
        let fusion = config
            .fusion()
            .map_err(|e| SearchError::InvalidConfig(e.to_string()))?;

        if !config.dedup_epsilon_secs.is_finite() || config.dedup_epsilon_secs < 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "dedup epsilon must be a non-negative number, got {}",
                config.dedup_epsilon_secs
            )));
        }

        Ok(Self {
            backend,
            embedding_provider,
            fusion,
            dedup_epsilon: config.dedup_epsilon_secs,
        })
    }

    /// Searcher with the stock 0.45/0.55 weights and 1 ms dedup window
    pub fn with_defaults(
        backend: Arc<dyn RetrievalBackend>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            backend,
            embedding_provider,
            fusion: FusionConfig::default(),
            dedup_epsilon: DEFAULT_DEDUP_EPSILON,
        }
    }

    pub fn fusion_config(&self) -> &FusionConfig {
        &self.fusion
    }

    pub fn dedup_epsilon(&self) -> f64 {
        self.dedup_epsilon
    }

    /// Run a search
    ///
    /// Input is validated before any backend call. An empty result set is a
    /// successful outcome, not an error.
    pub async fn search(&self, query: &SearchQuery) -> Result<RankedResultSet, SearchError> {
        let window = Self::validate(query)?;

        let (candidates, has_more) = match query.mode {
            SearchMode::Lexical => {
                let raw = self.lexical_candidates(query).await?;
                let has_more = raw.len() == query.limit;
                let hits = normalize_min_max(raw, RetrievalKind::Lexical)
                    .into_iter()
                    .map(FusedCandidate::from)
                    .collect();
                (hits, has_more)
            }
            SearchMode::Semantic => {
                let raw = self.semantic_candidates(query).await?;
                let has_more = raw.len() == query.limit;
                let hits = normalize_certainty(raw)
                    .into_iter()
                    .map(FusedCandidate::from)
                    .collect();
                (hits, has_more)
            }
            SearchMode::Hybrid => {
                let (lexical, semantic) = tokio::try_join!(
                    self.lexical_candidates(query),
                    self.semantic_candidates(query)
                )?;
                let has_more = lexical.len() == query.limit || semantic.len() == query.limit;

                tracing::debug!(
                    "Hybrid retrieval returned {} lexical and {} semantic candidates",
                    lexical.len(),
                    semantic.len()
                );

                let fused = fuse(
                    normalize_min_max(lexical, RetrievalKind::Lexical),
                    normalize_certainty(semantic),
                    &self.fusion,
                );
                (fused, has_more)
            }
        };

        let hits = self.rank(candidates, &window, query.limit);

        Ok(RankedResultSet {
            mode: query.mode,
            hits,
            has_more,
        })
    }

    /// Run a search restricted to one document
    ///
    /// The document constraint is ANDed with the query's scope: a scope
    /// already pinned to a different document yields an empty result set
    /// without any backend call.
    pub async fn search_within_document(
        &self,
        document_id: &str,
        query: &SearchQuery,
    ) -> Result<RankedResultSet, SearchError> {
        if document_id.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Document id cannot be empty".to_string(),
            ));
        }

        if let Some(pinned) = &query.scope.document_id {
            if pinned != document_id {
                Self::validate(query)?;
                tracing::debug!(
                    "Scope already pinned to document {}, nothing matches {}",
                    pinned,
                    document_id
                );
                return Ok(RankedResultSet::empty(query.mode));
            }
        }

        let mut scoped = query.clone();
        scoped.scope.document_id = Some(document_id.to_string());
        self.search(&scoped).await
    }

    fn validate(query: &SearchQuery) -> Result<ScoreWindow, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        if query.limit == 0 {
            return Err(SearchError::InvalidQuery(
                "Limit must be greater than 0".to_string(),
            ));
        }

        ScoreWindow::new(query.threshold_min, query.threshold_max)
            .map_err(|e| SearchError::InvalidQuery(e.to_string()))
    }

    /// Dedup, threshold, sort and cut to the page size
    ///
    /// Ties on combined score keep their pre-dedup rank.
    fn rank(
        &self,
        candidates: Vec<FusedCandidate>,
        window: &ScoreWindow,
        limit: usize,
    ) -> Vec<FusedCandidate> {
        let before = candidates.len();
        let ranked: Vec<(usize, FusedCandidate)> = candidates.into_iter().enumerate().collect();

        let deduped = deduplicate(
            ranked,
            |(_, hit)| (hit.document_id.as_str(), hit.start_time),
            |(_, hit)| hit.combined_score,
            self.dedup_epsilon,
        );
        let after_dedup = deduped.len();

        let mut kept = window.apply(deduped);
        kept.sort_by(|(rank_a, a), (rank_b, b)| {
            b.combined_score
                .total_cmp(&a.combined_score)
                .then(rank_a.cmp(rank_b))
        });
        kept.truncate(limit);

        tracing::debug!(
            "Ranked {} candidates: {} after dedup, {} returned (window {}..={})",
            before,
            after_dedup,
            kept.len(),
            window.min(),
            window.max()
        );

        kept.into_iter().map(|(_, hit)| hit).collect()
    }

    async fn lexical_candidates(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        self.backend
            .lexical_search(query.text.trim(), &query.scope, query.limit, query.offset)
            .await
            .and_then(finite_scores)
            .map_err(|source| SearchError::RetrievalFailure {
                kind: RetrievalKind::Lexical,
                source,
            })
    }

    async fn semantic_candidates(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        let vector = self.embed_query(query.text.trim()).await?;

        self.backend
            .semantic_search(&vector, &query.scope, query.limit, query.offset)
            .await
            .and_then(finite_scores)
            .map_err(|source| SearchError::RetrievalFailure {
                kind: RetrievalKind::Semantic,
                source,
            })
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let vector = self
            .embedding_provider
            .embed(text)
            .await
            .map_err(|e| SearchError::EmbeddingFailure(e.to_string()))?;

        if vector.is_empty() {
            return Err(SearchError::EmbeddingFailure(format!(
                "{} returned an empty vector",
                self.embedding_provider.model_name()
            )));
        }

        if let Some(expected) = self.embedding_provider.dimension() {
            if vector.len() != expected {
                return Err(SearchError::EmbeddingFailure(format!(
                    "Dimension mismatch: expected {}, got {}",
                    expected,
                    vector.len()
                )));
            }
        }

        if vector.iter().any(|v| !v.is_finite()) {
            return Err(SearchError::EmbeddingFailure(
                "Vector contains non-finite values".to_string(),
            ));
        }

        Ok(vector)
    }
}

/// Reject candidates whose raw score is NaN or infinite
fn finite_scores(
    candidates: Vec<RetrievalCandidate>,
) -> Result<Vec<RetrievalCandidate>, BackendError> {
    match candidates.iter().find(|c| !c.raw_score.is_finite()) {
        Some(bad) => Err(BackendError::Malformed(format!(
            "candidate {} has non-finite score {}",
            bad.id, bad.raw_score
        ))),
        None => Ok(candidates),
    }
}
