//! Score normalization into [0, 1]

use crate::retrieval::{NormalizedCandidate, RetrievalCandidate, RetrievalKind};

/// Min-max rescale a batch of raw scores
///
/// Output is positional. A uniform batch (including a single score) maps to
/// all 1.0. Negative inputs are fine. Bounds come from finite scores only;
/// NaN and negative infinity map to 0.0, positive infinity to 1.0.
pub fn normalize(scores: &[f64]) -> Vec<f64> {
    let (min, max) = scores
        .iter()
        .filter(|s| s.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    let range = max - min;

    scores
        .iter()
        .map(|&s| {
            if s.is_nan() || s == f64::NEG_INFINITY {
                0.0
            } else if s == f64::INFINITY {
                1.0
            } else if !(range > 0.0) {
                1.0
            } else {
                ((s - min) / range).clamp(0.0, 1.0)
            }
        })
        .collect()
}

/// Min-max normalize a batch of candidates from one retrieval call
pub fn normalize_min_max(
    candidates: Vec<RetrievalCandidate>,
    kind: RetrievalKind,
) -> Vec<NormalizedCandidate> {
    let raw: Vec<f64> = candidates.iter().map(|c| c.raw_score).collect();
    let normalized = normalize(&raw);

    candidates
        .into_iter()
        .zip(normalized)
        .map(|(candidate, normalized_score)| NormalizedCandidate {
            candidate,
            kind,
            normalized_score,
        })
        .collect()
}

/// Use a backend's native certainty as the normalized score
///
/// Certainty is already approximately in [0, 1]; it is only clamped.
pub fn normalize_certainty(candidates: Vec<RetrievalCandidate>) -> Vec<NormalizedCandidate> {
    candidates
        .into_iter()
        .map(|candidate| {
            let normalized_score = if candidate.raw_score.is_nan() {
                0.0
            } else {
                candidate.raw_score.clamp(0.0, 1.0)
            };
            NormalizedCandidate {
                candidate,
                kind: RetrievalKind::Semantic,
                normalized_score,
            }
        })
        .collect()
}
