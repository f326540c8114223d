//! Candidate records and scored result structures

use crate::retrieval::SearchMode;
use crate::transcript::{words_within, TimeSpan, Word};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Retrieval capability that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalKind {
    Lexical,
    Semantic,
}

impl fmt::Display for RetrievalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalKind::Lexical => f.write_str("lexical"),
            RetrievalKind::Semantic => f.write_str("semantic"),
        }
    }
}

/// Passthrough fields the engine never interprets (title, transcription,
/// speaker, NER data, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// String values stored under `key`, whether a single string or an array
    pub fn string_values(&self, key: &str) -> Vec<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One record returned by a retrieval backend
///
/// `raw_score` is mode specific (BM25 score or vector certainty) and is not
/// comparable across modes until normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    /// Identifier, unique within one retrieval call
    pub id: String,

    /// Parent interview/recording
    pub document_id: String,

    /// Span start in seconds
    pub start_time: f64,

    /// Span end in seconds
    pub end_time: f64,

    /// Backend-native relevance
    pub raw_score: f64,

    #[serde(default)]
    pub payload: Payload,
}

impl RetrievalCandidate {
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        start_time: f64,
        end_time: f64,
        raw_score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            start_time,
            end_time,
            raw_score,
            payload: Payload::default(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time, self.end_time)
    }
}

/// A candidate with its score rescaled into [0, 1] within its batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedCandidate {
    pub candidate: RetrievalCandidate,
    pub kind: RetrievalKind,
    pub normalized_score: f64,
}

/// A ranked hit carrying both score components and their blend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedCandidate {
    pub id: String,
    pub document_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub payload: Payload,

    /// Normalized lexical score, 0 when absent
    pub lexical_score: f64,

    /// Semantic certainty, 0 when absent
    pub semantic_score: f64,

    /// Weighted blend used for ranking and thresholding
    pub combined_score: f64,
}

impl FusedCandidate {
    pub(crate) fn from_parts(
        candidate: RetrievalCandidate,
        lexical_score: f64,
        semantic_score: f64,
        combined_score: f64,
    ) -> Self {
        Self {
            id: candidate.id,
            document_id: candidate.document_id,
            start_time: candidate.start_time,
            end_time: candidate.end_time,
            payload: candidate.payload,
            lexical_score,
            semantic_score,
            combined_score,
        }
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time, self.end_time)
    }

    /// Transcript words lying inside this hit's span
    pub fn matched_words<'a>(&self, words: &'a [Word], tolerance: f64) -> Vec<&'a Word> {
        words_within(words, &self.span(), tolerance)
    }

    /// Short preview of a text payload field (first N characters)
    pub fn preview(&self, field: &str, max_chars: usize) -> Option<String> {
        let text = self.payload.get_str(field)?;
        if text.chars().count() <= max_chars {
            Some(text.to_string())
        } else {
            let truncated: String = text.chars().take(max_chars).collect();
            Some(format!("{}...", truncated))
        }
    }
}

impl From<NormalizedCandidate> for FusedCandidate {
    /// Single-mode hit: the unused component stays 0
    fn from(normalized: NormalizedCandidate) -> Self {
        let score = normalized.normalized_score;
        let (lexical, semantic) = match normalized.kind {
            RetrievalKind::Lexical => (score, 0.0),
            RetrievalKind::Semantic => (0.0, score),
        };
        Self::from_parts(normalized.candidate, lexical, semantic, score)
    }
}

/// Anything carrying a relevance score in [0, 1]
pub trait Scored {
    fn score(&self) -> f64;
}

impl Scored for NormalizedCandidate {
    fn score(&self) -> f64 {
        self.normalized_score
    }
}

impl Scored for FusedCandidate {
    fn score(&self) -> f64 {
        self.combined_score
    }
}

impl<T: Scored> Scored for (usize, T) {
    fn score(&self) -> f64 {
        self.1.score()
    }
}

/// Final output of one search invocation
#[derive(Debug, Clone, Serialize)]
pub struct RankedResultSet {
    pub mode: SearchMode,

    /// Hits sorted by combined score descending
    pub hits: Vec<FusedCandidate>,

    /// Set when a backend returned exactly the requested page size
    pub has_more: bool,
}

impl RankedResultSet {
    pub fn empty(mode: SearchMode) -> Self {
        Self {
            mode,
            hits: Vec::new(),
            has_more: false,
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FusedCandidate> {
        self.hits.iter()
    }
}
