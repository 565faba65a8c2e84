// Decoding types
// Accuracy curves and the errors raised by time-resolved decoding

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ROC-AUC of a classifier that cannot separate the classes
pub const CHANCE_LEVEL: f64 = 0.5;

/// Errors that can occur during cross-validated decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid fold count {0}: cross-validation needs at least 2 folds")]
    InvalidFoldCount(usize),

    #[error("Too few trials for cross-validation: {trials} trials for {folds} folds")]
    TooFewTrials { trials: usize, folds: usize },

    #[error("Labels hold a single class ({positives} of {trials} trials positive); ROC-AUC is undefined")]
    DegenerateLabels { positives: usize, trials: usize },

    #[error("Label vector has {labels} entries but there are {trials} trials")]
    LabelLengthMismatch { labels: usize, trials: usize },

    #[error("No held-out predictions could be scored at sample {0}")]
    Unscorable(usize),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Cross-validated ROC-AUC at every timestamp of a time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyCurve {
    times: Vec<f64>,
    scores: Vec<f64>,
}

impl AccuracyCurve {
    /// Pair a time axis with one score per timestamp
    pub fn new(times: Vec<f64>, scores: Vec<f64>) -> Self {
        debug_assert_eq!(times.len(), scores.len());
        AccuracyCurve { times, scores }
    }

    /// Timestamps in seconds
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// (time, score) pairs in time order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.scores.iter().copied())
    }

    /// Mean score across the whole time axis
    pub fn mean(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        Some(self.scores.iter().sum::<f64>() / self.scores.len() as f64)
    }

    /// Timestamp and score of the best-decoded sample
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.points()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}
