//! Transcript time spans
//!
//! Spans are closed intervals in seconds. A word belongs to a hit when its
//! whole span lies inside the hit's span, allowing a small tolerance for
//! timestamp jitter.

use serde::{Deserialize, Serialize};

/// Default jitter tolerance when matching words to spans
pub const MATCH_TOLERANCE_SECS: f64 = 0.001;

/// Closed time interval `[start, end]` in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Whether `inner` lies fully inside this span
    pub fn contains(&self, inner: &TimeSpan, tolerance: f64) -> bool {
        inner.start >= self.start - tolerance && inner.end <= self.end + tolerance
    }

    /// Whether the two spans share at least one instant
    pub fn overlaps(&self, other: &TimeSpan, tolerance: f64) -> bool {
        other.end >= self.start - tolerance && other.start <= self.end + tolerance
    }
}

/// One timestamped transcript word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Word {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.end)
    }
}

/// Words fully contained in `span`, in transcript order
pub fn words_within<'a>(words: &'a [Word], span: &TimeSpan, tolerance: f64) -> Vec<&'a Word> {
    words
        .iter()
        .filter(|word| span.contains(&word.span(), tolerance))
        .collect()
}

/// Format seconds as `M:SS`, or `H:MM:SS` past the hour
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
