//! Weighted linear fusion of lexical and semantic scores

use crate::retrieval::{FusedCandidate, NormalizedCandidate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_LEXICAL_WEIGHT: f64 = 0.45;
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.55;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug, PartialEq)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be finite and non-negative (lexical={lexical}, semantic={semantic})")]
    InvalidWeights { lexical: f64, semantic: f64 },

    #[error("Invalid weight configuration: weights must sum to 1.0, got {sum}")]
    WeightsNotNormalized { sum: f64 },
}

/// Configuration for the fusion ranker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weight for normalized BM25 scores
    pub lexical_weight: f64,

    /// Weight for semantic certainty
    pub semantic_weight: f64,
}

impl FusionConfig {
    pub fn new(lexical_weight: f64, semantic_weight: f64) -> Result<Self, FusionError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(lexical_weight) || !valid(semantic_weight) {
            return Err(FusionError::InvalidWeights {
                lexical: lexical_weight,
                semantic: semantic_weight,
            });
        }

        let sum = lexical_weight + semantic_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(FusionError::WeightsNotNormalized { sum });
        }

        Ok(Self {
            lexical_weight,
            semantic_weight,
        })
    }

    /// Weights actually applied to one fusion run, as (lexical, semantic)
    ///
    /// An empty lexical set falls back to pure semantic weighting so hybrid
    /// degrades to vector-only instead of capping every score.
    pub fn effective_weights(&self, has_lexical: bool) -> (f64, f64) {
        if has_lexical {
            (self.lexical_weight, self.semantic_weight)
        } else {
            (0.0, 1.0)
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            lexical_weight: DEFAULT_LEXICAL_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
        }
    }
}

/// Fuse lexical and semantic candidates into one ranking
///
/// combined = W_semantic * semantic + W_lexical * lexical, with a missing
/// component counting as 0. Each id appears once, keeping its best blend.
///
/// # Returns
/// Fused candidates sorted by combined score descending; ties keep encounter
/// order (lexical set first, then semantic).
pub fn fuse(
    lexical: Vec<NormalizedCandidate>,
    semantic: Vec<NormalizedCandidate>,
    config: &FusionConfig,
) -> Vec<FusedCandidate> {
    let (lexical_weight, semantic_weight) = config.effective_weights(!lexical.is_empty());

    let lexical_scores = best_scores(&lexical);
    let semantic_scores = best_scores(&semantic);

    let mut fused: Vec<FusedCandidate> = Vec::with_capacity(lexical.len() + semantic.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for normalized in lexical.into_iter().chain(semantic) {
        let id = normalized.candidate.id.as_str();
        let lexical_score = lexical_scores.get(id).copied().unwrap_or(0.0);
        let semantic_score = semantic_scores.get(id).copied().unwrap_or(0.0);
        let combined_score = (semantic_weight * semantic_score + lexical_weight * lexical_score)
            .clamp(0.0, 1.0);

        match positions.get(id) {
            Some(&pos) => {
                if fused[pos].combined_score < combined_score {
                    fused[pos] = FusedCandidate::from_parts(
                        normalized.candidate,
                        lexical_score,
                        semantic_score,
                        combined_score,
                    );
                }
            }
            None => {
                positions.insert(normalized.candidate.id.clone(), fused.len());
                fused.push(FusedCandidate::from_parts(
                    normalized.candidate,
                    lexical_score,
                    semantic_score,
                    combined_score,
                ));
            }
        }
    }

    fused.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));

    fused
}

/// Best normalized score per id within one batch
fn best_scores(batch: &[NormalizedCandidate]) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = HashMap::with_capacity(batch.len());
    for normalized in batch {
        scores
            .entry(normalized.candidate.id.clone())
            .and_modify(|s| *s = s.max(normalized.normalized_score))
            .or_insert(normalized.normalized_score);
    }
    scores
}
