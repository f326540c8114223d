//! Relevance window filtering on fused scores

use crate::retrieval::Scored;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ThresholdError {
    #[error("threshold minimum {min} exceeds maximum {max}")]
    Inverted { min: f64, max: f64 },

    #[error("threshold bounds must be numbers (min={min}, max={max})")]
    NotANumber { min: f64, max: f64 },
}

/// Inclusive `[min, max]` window on combined scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWindow {
    min: f64,
    max: f64,
}

impl ScoreWindow {
    pub fn new(min: f64, max: f64) -> Result<Self, ThresholdError> {
        if min.is_nan() || max.is_nan() {
            return Err(ThresholdError::NotANumber { min, max });
        }
        if min > max {
            return Err(ThresholdError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }

    /// Keep results whose score lies inside the window, preserving order
    pub fn apply<T: Scored>(&self, results: Vec<T>) -> Vec<T> {
        results
            .into_iter()
            .filter(|r| self.contains(r.score()))
            .collect()
    }
}

impl Default for ScoreWindow {
    /// Accept every normalized score
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Filter scored results to `[min, max]`, boundaries inclusive
pub fn filter_by_threshold<T: Scored>(
    results: Vec<T>,
    min: f64,
    max: f64,
) -> Result<Vec<T>, ThresholdError> {
    Ok(ScoreWindow::new(min, max)?.apply(results))
}
