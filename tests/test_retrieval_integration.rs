//! Integration tests: hybrid relevance pipeline against mock capabilities

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storyfind::retrieval::{
    BackendError, EmbeddingProvider, HybridSearcher, Payload, RetrievalBackend,
    RetrievalCandidate, RetrievalKind, SearchError, SearchMode, SearchQuery, SearchScope,
};

/// Backend returning canned results and recording every call
#[derive(Default)]
struct MockBackend {
    lexical: Vec<RetrievalCandidate>,
    semantic: Vec<RetrievalCandidate>,
    fail_lexical: bool,
    fail_semantic: bool,
    lexical_calls: AtomicUsize,
    semantic_calls: AtomicUsize,
    seen_scopes: Mutex<Vec<SearchScope>>,
    seen_pages: Mutex<Vec<(usize, usize)>>,
}

impl MockBackend {
    fn calls(&self) -> usize {
        self.lexical_calls.load(Ordering::SeqCst) + self.semantic_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalBackend for MockBackend {
    async fn lexical_search(
        &self,
        _query: &str,
        scope: &SearchScope,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RetrievalCandidate>, BackendError> {
        self.lexical_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_scopes.lock().unwrap().push(scope.clone());
        self.seen_pages.lock().unwrap().push((limit, offset));
        if self.fail_lexical {
            return Err(BackendError::Unavailable("connection refused".to_string()));
        }
        Ok(self.lexical.clone())
    }

    async fn semantic_search(
        &self,
        _vector: &[f32],
        scope: &SearchScope,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<RetrievalCandidate>, BackendError> {
        self.semantic_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_scopes.lock().unwrap().push(scope.clone());
        if self.fail_semantic {
            return Err(BackendError::Rejected("vector dimension mismatch".to_string()));
        }
        Ok(self.semantic.clone())
    }
}

/// Backend whose two calls only complete when both are in flight together
struct RendezvousBackend {
    barrier: tokio::sync::Barrier,
}

#[async_trait]
impl RetrievalBackend for RendezvousBackend {
    async fn lexical_search(
        &self,
        _query: &str,
        _scope: &SearchScope,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<RetrievalCandidate>, BackendError> {
        self.barrier.wait().await;
        Ok(vec![chunk("a", "doc1", 0.0, 2.0)])
    }

    async fn semantic_search(
        &self,
        _vector: &[f32],
        _scope: &SearchScope,
        _limit: usize,
        _offset: usize,
    ) -> Result<Vec<RetrievalCandidate>, BackendError> {
        self.barrier.wait().await;
        Ok(vec![chunk("b", "doc2", 0.0, 0.8)])
    }
}

enum EmbedBehavior {
    Vector(Vec<f32>),
    Fail,
}

struct MockEmbedder {
    behavior: EmbedBehavior,
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn returning(vector: Vec<f32>) -> Self {
        Self {
            behavior: EmbedBehavior::Vector(vector),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            behavior: EmbedBehavior::Fail,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            EmbedBehavior::Vector(v) => Ok(v.clone()),
            EmbedBehavior::Fail => Err(BackendError::Unavailable(
                "embedding service returned 503".to_string(),
            )),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

fn chunk(id: &str, document_id: &str, start: f64, raw_score: f64) -> RetrievalCandidate {
    RetrievalCandidate::new(id, document_id, start, start + 4.0, raw_score).with_payload(
        Payload::new()
            .with("interview_title", "The 1927 Flood")
            .with("transcription", format!("chunk {}", id)),
    )
}

fn setup(
    backend: MockBackend,
    embedder: MockEmbedder,
) -> (Arc<MockBackend>, Arc<MockEmbedder>, HybridSearcher) {
    let backend = Arc::new(backend);
    let embedder = Arc::new(embedder);
    let searcher = HybridSearcher::with_defaults(backend.clone(), embedder.clone());
    (backend, embedder, searcher)
}

#[tokio::test]
async fn test_end_to_end_hybrid_flood() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 10.0, 5.0), chunk("b", "doc1", 30.0, 2.0)],
        semantic: vec![chunk("a", "doc1", 10.0, 0.9), chunk("c", "doc2", 5.0, 0.95)],
        ..MockBackend::default()
    };
    let (backend, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1, 0.3]));

    let query = SearchQuery::new("flood", 10).with_mode(SearchMode::Hybrid);
    let results = searcher.search(&query).await.unwrap();

    assert_eq!(backend.lexical_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.semantic_calls.load(Ordering::SeqCst), 1);

    let ids: Vec<&str> = results.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c", "b"]);

    let a = &results.hits[0];
    assert_eq!(a.lexical_score, 1.0);
    assert_eq!(a.semantic_score, 0.9);
    assert!((a.combined_score - (0.55 * 0.9 + 0.45 * 1.0)).abs() < 1e-12);

    let c = &results.hits[1];
    assert_eq!(c.lexical_score, 0.0);
    assert_eq!(c.semantic_score, 0.95);
    assert!((c.combined_score - 0.55 * 0.95).abs() < 1e-12);

    let b = &results.hits[2];
    assert_eq!(b.lexical_score, 0.0);
    assert_eq!(b.semantic_score, 0.0);
    assert_eq!(b.combined_score, 0.0);

    // Payload passes through untouched
    assert_eq!(a.payload.get_str("interview_title"), Some("The 1927 Flood"));
    assert!(!results.has_more);
}

#[tokio::test]
async fn test_threshold_applies_to_combined_score() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 10.0, 5.0), chunk("b", "doc1", 30.0, 2.0)],
        semantic: vec![chunk("a", "doc1", 10.0, 0.9), chunk("c", "doc2", 5.0, 0.95)],
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let query = SearchQuery::new("flood", 10).with_threshold(0.4, 1.0);
    let results = searcher.search(&query).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_hybrid_falls_back_to_semantic_weights() {
    let backend = MockBackend {
        semantic: vec![chunk("x", "doc1", 0.0, 0.8), chunk("y", "doc1", 20.0, 0.6)],
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.5]));

    let results = searcher.search(&SearchQuery::new("levee", 10)).await.unwrap();
    let scores: Vec<f64> = results.iter().map(|h| h.combined_score).collect();

    assert_eq!(scores, vec![0.8, 0.6]);
}

#[tokio::test]
async fn test_invalid_threshold_issues_no_calls() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 0.0, 1.0)],
        ..MockBackend::default()
    };
    let (backend, embedder, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let query = SearchQuery::new("flood", 10).with_threshold(0.9, 0.1);
    let result = searcher.search(&query).await;

    assert!(matches!(result, Err(SearchError::InvalidQuery(_))));
    assert_eq!(backend.calls(), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blank_query_rejected() {
    let (backend, _, searcher) = setup(
        MockBackend::default(),
        MockEmbedder::returning(vec![0.1]),
    );

    for text in ["", "   "] {
        let result = searcher.search(&SearchQuery::new(text, 10)).await;
        assert!(matches!(result, Err(SearchError::InvalidQuery(_))));
    }

    let result = searcher.search(&SearchQuery::new("flood", 0)).await;
    assert!(matches!(result, Err(SearchError::InvalidQuery(_))));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_embedding_failure_aborts_hybrid() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 0.0, 3.0)],
        ..MockBackend::default()
    };
    let (backend, _, searcher) = setup(backend, MockEmbedder::failing());

    let result = searcher.search(&SearchQuery::new("flood", 10)).await;

    assert!(matches!(result, Err(SearchError::EmbeddingFailure(_))));
    assert_eq!(backend.semantic_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_embedding_rejected() {
    let (_, _, searcher) = setup(MockBackend::default(), MockEmbedder::returning(Vec::new()));
    let query = SearchQuery::new("flood", 10).with_mode(SearchMode::Semantic);
    assert!(matches!(
        searcher.search(&query).await,
        Err(SearchError::EmbeddingFailure(_))
    ));

    let (_, _, searcher) = setup(
        MockBackend::default(),
        MockEmbedder::returning(vec![0.1, f32::NAN]),
    );
    assert!(matches!(
        searcher.search(&query).await,
        Err(SearchError::EmbeddingFailure(_))
    ));
}

#[tokio::test]
async fn test_retrieval_failure_surfaces() {
    let backend = MockBackend {
        fail_lexical: true,
        semantic: vec![chunk("a", "doc1", 0.0, 0.9)],
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let result = searcher.search(&SearchQuery::new("flood", 10)).await;

    match result {
        Err(SearchError::RetrievalFailure { kind, source }) => {
            assert_eq!(kind, RetrievalKind::Lexical);
            assert!(matches!(source, BackendError::Unavailable(_)));
        }
        other => panic!("expected retrieval failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_result_is_not_an_error() {
    let (_, _, searcher) = setup(MockBackend::default(), MockEmbedder::returning(vec![0.1]));

    let results = searcher.search(&SearchQuery::new("flood", 10)).await.unwrap();
    assert!(results.is_empty());
    assert!(!results.has_more);
}

#[tokio::test]
async fn test_lexical_only_skips_embedding() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 0.0, 3.0), chunk("b", "doc1", 9.0, 1.0)],
        ..MockBackend::default()
    };
    let (backend, embedder, searcher) = setup(backend, MockEmbedder::failing());

    let query = SearchQuery::new("flood", 2).with_mode(SearchMode::Lexical);
    let results = searcher.search(&query).await.unwrap();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.semantic_calls.load(Ordering::SeqCst), 0);
    assert_eq!(results.hits[0].combined_score, 1.0);
    assert_eq!(results.hits[0].semantic_score, 0.0);
    // Backend filled the page exactly
    assert!(results.has_more);
}

#[tokio::test]
async fn test_semantic_only_uses_certainty_directly() {
    let backend = MockBackend {
        semantic: vec![chunk("a", "doc1", 0.0, 0.62), chunk("b", "doc1", 9.0, 0.48)],
        ..MockBackend::default()
    };
    let (backend, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let query = SearchQuery::new("flood", 10).with_mode(SearchMode::Semantic);
    let results = searcher.search(&query).await.unwrap();

    assert_eq!(backend.lexical_calls.load(Ordering::SeqCst), 0);
    let scores: Vec<f64> = results.iter().map(|h| h.combined_score).collect();
    assert_eq!(scores, vec![0.62, 0.48]);
}

#[tokio::test]
async fn test_near_duplicate_timestamps_collapse() {
    let backend = MockBackend {
        semantic: vec![
            chunk("a", "doc1", 10.0000, 0.5),
            chunk("b", "doc1", 10.0003, 0.9),
            chunk("c", "doc1", 10.0500, 0.7),
            chunk("d", "doc2", 10.0001, 0.6),
        ],
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let query = SearchQuery::new("flood", 10).with_mode(SearchMode::Semantic);
    let results = searcher.search(&query).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "d"]);
}

#[tokio::test]
async fn test_search_within_document_adds_scope() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "story-7", 0.0, 3.0)],
        semantic: vec![chunk("a", "story-7", 0.0, 0.7)],
        ..MockBackend::default()
    };
    let (backend, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let scope = SearchScope::new().with_entity_labels(["PERSON"]);
    let query = SearchQuery::new("grandmother", 25)
        .with_scope(scope)
        .with_offset(50);
    searcher
        .search_within_document("story-7", &query)
        .await
        .unwrap();

    let scopes = backend.seen_scopes.lock().unwrap();
    assert_eq!(scopes.len(), 2);
    for scope in scopes.iter() {
        assert_eq!(scope.document_id.as_deref(), Some("story-7"));
        assert!(scope.entity_labels.contains("PERSON"));
    }
    assert_eq!(backend.seen_pages.lock().unwrap()[0], (25, 50));

    // The caller's query is left untouched
    assert!(query.scope.document_id.is_none());
    assert!(matches!(
        searcher.search_within_document(" ", &query).await,
        Err(SearchError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_semantic_retrieval_failure_surfaces() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 0.0, 3.0)],
        fail_semantic: true,
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    match searcher.search(&SearchQuery::new("flood", 10)).await {
        Err(SearchError::RetrievalFailure { kind, source }) => {
            assert_eq!(kind, RetrievalKind::Semantic);
            assert!(matches!(source, BackendError::Rejected(_)));
        }
        other => panic!("expected retrieval failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_finite_scores_rejected() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 0.0, 5.0), chunk("b", "doc1", 20.0, f64::NAN)],
        semantic: vec![chunk("b", "doc1", 20.0, 0.99)],
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    match searcher.search(&SearchQuery::new("flood", 10)).await {
        Err(SearchError::RetrievalFailure { kind, source }) => {
            assert_eq!(kind, RetrievalKind::Lexical);
            assert!(matches!(source, BackendError::Malformed(_)));
        }
        other => panic!("expected malformed lexical scores, got {:?}", other),
    }

    let backend = MockBackend {
        semantic: vec![chunk("a", "doc1", 0.0, f64::INFINITY)],
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));
    let query = SearchQuery::new("flood", 10).with_mode(SearchMode::Semantic);

    assert!(matches!(
        searcher.search(&query).await,
        Err(SearchError::RetrievalFailure {
            kind: RetrievalKind::Semantic,
            source: BackendError::Malformed(_),
        })
    ));
}

#[tokio::test]
async fn test_hybrid_has_more_from_either_side() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "doc1", 0.0, 3.0)],
        semantic: vec![chunk("b", "doc1", 10.0, 0.9), chunk("c", "doc2", 0.0, 0.7)],
        ..MockBackend::default()
    };
    let (_, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let results = searcher.search(&SearchQuery::new("flood", 2)).await.unwrap();
    assert!(results.has_more);
    assert_eq!(results.len(), 2);

    let results = searcher.search(&SearchQuery::new("flood", 3)).await.unwrap();
    assert!(!results.has_more);
}

#[tokio::test]
async fn test_hybrid_retrievals_run_concurrently() {
    let backend = Arc::new(RendezvousBackend {
        barrier: tokio::sync::Barrier::new(2),
    });
    let searcher =
        HybridSearcher::with_defaults(backend, Arc::new(MockEmbedder::returning(vec![0.1])));

    // Sequential awaits would leave each call waiting on the barrier forever
    let results = tokio::time::timeout(
        Duration::from_secs(5),
        searcher.search(&SearchQuery::new("flood", 10)),
    )
    .await
    .expect("lexical and semantic retrieval should be in flight together")
    .unwrap();

    let ids: Vec<&str> = results.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_search_within_document_conflicting_scope() {
    let backend = MockBackend {
        lexical: vec![chunk("a", "story-7", 0.0, 3.0)],
        ..MockBackend::default()
    };
    let (backend, _, searcher) = setup(backend, MockEmbedder::returning(vec![0.1]));

    let query = SearchQuery::new("flood", 10)
        .with_mode(SearchMode::Lexical)
        .with_scope(SearchScope::new().within_document("story-3"));

    let results = searcher
        .search_within_document("story-7", &query)
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(backend.calls(), 0);

    // Validation still comes first
    let inverted = query.clone().with_threshold(0.8, 0.2);
    assert!(matches!(
        searcher.search_within_document("story-7", &inverted).await,
        Err(SearchError::InvalidQuery(_))
    ));

    // Agreeing constraints search normally
    let query = query.with_scope(SearchScope::new().within_document("story-7"));
    let results = searcher
        .search_within_document("story-7", &query)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(backend.calls(), 1);
}
