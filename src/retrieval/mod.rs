//! Hybrid relevance engine
//!
//! Lexical (BM25) and semantic (vector) candidates are normalized, fused with a
//! weighted linear blend, collapsed by time window and filtered against a
//! caller-supplied relevance window.

mod backend;
mod candidate;
mod deduplication;
mod fusion;
mod hybrid;
mod normalize;
mod replay;
mod scope;
mod threshold;

pub use backend::{BackendError, EmbeddingProvider, RetrievalBackend};
pub use candidate::{
    FusedCandidate, NormalizedCandidate, Payload, RankedResultSet, RetrievalCandidate,
    RetrievalKind, Scored,
};
pub use deduplication::{deduplicate, DEFAULT_DEDUP_EPSILON};
pub use fusion::{
    fuse, FusionConfig, FusionError, DEFAULT_LEXICAL_WEIGHT, DEFAULT_SEMANTIC_WEIGHT,
};
pub use hybrid::{HybridSearcher, SearchError};
pub use normalize::{normalize, normalize_certainty, normalize_min_max};
pub use replay::{FixedEmbedder, RecordedCandidates, ReplayBackend};
pub use scope::{Filter, FilterField, SearchScope};
pub use threshold::{filter_by_threshold, ScoreWindow, ThresholdError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which retrieval modes a search uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// BM25 only
    Lexical,
    /// Vector similarity only
    Semantic,
    /// Both, fused into one ranking
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Lexical => "lexical",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" | "bm25" => Ok(SearchMode::Lexical),
            "semantic" | "vector" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(SearchError::InvalidQuery(format!(
                "Unknown search mode '{}'. Expected lexical, semantic or hybrid",
                other
            ))),
        }
    }
}

/// Search request with scope, paging and relevance window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Retrieval mode
    pub mode: SearchMode,

    /// Scope constraints passed through to the retrieval backend
    pub scope: SearchScope,

    /// Page size
    pub limit: usize,

    /// Number of candidates to skip at the backend
    pub offset: usize,

    /// Lowest combined score kept (inclusive)
    pub threshold_min: f64,

    /// Highest combined score kept (inclusive)
    pub threshold_max: f64,
}

impl SearchQuery {
    /// Hybrid query over everything, accepting the full [0, 1] score range
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        let window = ScoreWindow::default();
        Self {
            text: text.into(),
            mode: SearchMode::default(),
            scope: SearchScope::default(),
            limit,
            offset: 0,
            threshold_min: window.min(),
            threshold_max: window.max(),
        }
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_threshold(mut self, min: f64, max: f64) -> Self {
        self.threshold_min = min;
        self.threshold_max = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert_eq!("BM25".parse::<SearchMode>().unwrap(), SearchMode::Lexical);
        assert_eq!(" vector ".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert!(matches!(
            "fuzzy".parse::<SearchMode>(),
            Err(SearchError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_query_builder() {
        let query = SearchQuery::new("flood", 10)
            .with_mode(SearchMode::Lexical)
            .with_offset(20)
            .with_threshold(0.4, 1.0);

        assert_eq!(query.mode, SearchMode::Lexical);
        assert_eq!(query.offset, 20);
        assert_eq!(query.threshold_min, 0.4);
        assert!(query.scope.is_unrestricted());
    }
}
