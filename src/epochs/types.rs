// Trial collection types
// Epoched multi-channel recordings sharing one time axis, with per-trial metadata

use ndarray::{s, Array3, ArrayView2, Axis};
use std::collections::BTreeMap;
use thiserror::Error;

/// Categorical metadata attached to a single trial (field name -> value)
pub type TrialMetadata = BTreeMap<String, String>;

/// Errors that can occur while loading or transforming epochs
#[derive(Debug, Error)]
pub enum EpochError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse epoch container: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read annotation table: {0}")]
    Annotations(#[from] csv::Error),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Metadata has {found} rows but the collection has {expected} trials")]
    MetadataMismatch { expected: usize, found: usize },

    #[error("Invalid sampling frequency: {0}")]
    InvalidSamplingRate(f64),

    #[error("Resampling failed: {0}")]
    Resample(String),
}

pub type EpochResult<T> = Result<T, EpochError>;

/// An ordered set of trials over a shared channel set and time axis
///
/// Signal data is stored as `[trials, channels, times]`. The time axis is in
/// seconds relative to the trial-defining event (phoneme onset).
#[derive(Debug, Clone)]
pub struct TrialCollection {
    data: Array3<f64>,
    times: Vec<f64>,
    sfreq: f64,
    channel_names: Vec<String>,
    metadata: Vec<TrialMetadata>,
}

impl TrialCollection {
    /// Create a collection, checking that every dimension agrees
    pub fn new(
        data: Array3<f64>,
        times: Vec<f64>,
        sfreq: f64,
        channel_names: Vec<String>,
        metadata: Vec<TrialMetadata>,
    ) -> EpochResult<Self> {
        let (n_trials, n_channels, n_times) = data.dim();

        if !sfreq.is_finite() || sfreq <= 0.0 {
            return Err(EpochError::InvalidSamplingRate(sfreq));
        }

        if times.len() != n_times {
            return Err(EpochError::ShapeMismatch(format!(
                "time axis has {} samples but trials have {}",
                times.len(),
                n_times
            )));
        }

        if channel_names.len() != n_channels {
            return Err(EpochError::ShapeMismatch(format!(
                "{} channel names for {} channels",
                channel_names.len(),
                n_channels
            )));
        }

        if metadata.len() != n_trials {
            return Err(EpochError::MetadataMismatch {
                expected: n_trials,
                found: metadata.len(),
            });
        }

        Ok(TrialCollection {
            data,
            times,
            sfreq,
            channel_names,
            metadata,
        })
    }

    /// Create a collection with a regular time axis starting at `tmin`
    pub fn with_tmin(
        data: Array3<f64>,
        tmin: f64,
        sfreq: f64,
        channel_names: Vec<String>,
        metadata: Vec<TrialMetadata>,
    ) -> EpochResult<Self> {
        if !sfreq.is_finite() || sfreq <= 0.0 {
            return Err(EpochError::InvalidSamplingRate(sfreq));
        }
        let times = time_axis(tmin, sfreq, data.dim().2);
        Self::new(data, times, sfreq, channel_names, metadata)
    }

    pub fn n_trials(&self) -> usize {
        self.data.dim().0
    }

    pub fn n_channels(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_times(&self) -> usize {
        self.data.dim().2
    }

    /// Sampling frequency in Hz
    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    /// Time axis in seconds
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// First timestamp of the time axis (0.0 for an empty axis)
    pub fn tmin(&self) -> f64 {
        self.times.first().copied().unwrap_or(0.0)
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Full signal array `[trials, channels, times]`
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn metadata(&self) -> &[TrialMetadata] {
        &self.metadata
    }

    /// True when at least one trial carries a metadata field
    pub fn has_metadata(&self) -> bool {
        self.metadata.iter().any(|m| !m.is_empty())
    }

    /// Replace per-trial metadata (one entry per trial)
    pub fn set_metadata(&mut self, metadata: Vec<TrialMetadata>) -> EpochResult<()> {
        if metadata.len() != self.n_trials() {
            return Err(EpochError::MetadataMismatch {
                expected: self.n_trials(),
                found: metadata.len(),
            });
        }
        self.metadata = metadata;
        Ok(())
    }

    /// Metadata value of `field` for one trial
    pub fn metadata_value(&self, trial: usize, field: &str) -> Option<&str> {
        self.metadata
            .get(trial)
            .and_then(|m| m.get(field))
            .map(String::as_str)
    }

    /// Binary labels: does each trial's `field` equal `value`?
    /// Trials without the field are labelled negative.
    pub fn labels_for(&self, field: &str, value: &str) -> Vec<bool> {
        self.metadata
            .iter()
            .map(|m| m.get(field).is_some_and(|v| v == value))
            .collect()
    }

    /// Channel activity of every trial at one time sample, shape `[trials, channels]`
    pub fn features_at(&self, sample: usize) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., .., sample])
    }

    /// New collection holding the given trials in the given order
    /// Indices may repeat (the trial is then duplicated).
    pub fn select(&self, indices: &[usize]) -> TrialCollection {
        TrialCollection {
            data: self.data.select(Axis(0), indices),
            times: self.times.clone(),
            sfreq: self.sfreq,
            channel_names: self.channel_names.clone(),
            metadata: indices.iter().map(|&i| self.metadata[i].clone()).collect(),
        }
    }

    /// Swap in a resampled signal and its time axis
    pub(crate) fn replace_signal(&mut self, data: Array3<f64>, times: Vec<f64>, sfreq: f64) {
        debug_assert_eq!(data.dim().0, self.n_trials());
        debug_assert_eq!(data.dim().2, times.len());
        self.data = data;
        self.times = times;
        self.sfreq = sfreq;
    }
}

/// Regular time axis of `n` samples starting at `tmin`
pub(crate) fn time_axis(tmin: f64, sfreq: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| tmin + i as f64 / sfreq).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn meta(pairs: &[(&str, &str)]) -> TrialMetadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn small_collection() -> TrialCollection {
        let data = Array3::from_shape_fn((3, 2, 4), |(trial, ch, t)| {
            (trial * 100 + ch * 10 + t) as f64
        });
        let metadata = vec![
            meta(&[("phonation", "v"), ("manner", "f")]),
            meta(&[("phonation", "u"), ("manner", "f")]),
            meta(&[("phonation", "v")]),
        ];
        TrialCollection::with_tmin(
            data,
            -0.1,
            100.0,
            vec!["LA1".to_string(), "LA2".to_string()],
            metadata,
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions_and_time_axis() {
        let collection = small_collection();

        assert_eq!(collection.n_trials(), 3);
        assert_eq!(collection.n_channels(), 2);
        assert_eq!(collection.n_times(), 4);
        assert!((collection.tmin() + 0.1).abs() < 1e-12);
        assert!((collection.times()[3] + 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_shape_validation() {
        let data = Array3::<f64>::zeros((2, 2, 5));
        let result = TrialCollection::new(
            data,
            vec![0.0; 4],
            100.0,
            vec!["a".to_string(), "b".to_string()],
            vec![TrialMetadata::new(); 2],
        );
        assert!(matches!(result, Err(EpochError::ShapeMismatch(_))));

        let data = Array3::<f64>::zeros((2, 2, 5));
        let result = TrialCollection::with_tmin(
            data,
            0.0,
            100.0,
            vec!["a".to_string(), "b".to_string()],
            vec![TrialMetadata::new(); 3],
        );
        assert!(matches!(
            result,
            Err(EpochError::MetadataMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_invalid_sampling_rate() {
        let data = Array3::<f64>::zeros((1, 1, 2));
        let result = TrialCollection::with_tmin(
            data,
            0.0,
            0.0,
            vec!["a".to_string()],
            vec![TrialMetadata::new()],
        );
        assert!(matches!(result, Err(EpochError::InvalidSamplingRate(_))));
    }

    #[test]
    fn test_labels_for_missing_field_is_negative() {
        let collection = small_collection();

        assert_eq!(collection.labels_for("phonation", "v"), vec![true, false, true]);
        assert_eq!(collection.labels_for("manner", "f"), vec![true, true, false]);
        assert_eq!(collection.labels_for("place", "m"), vec![false, false, false]);
    }

    #[test]
    fn test_features_at_slices_time() {
        let collection = small_collection();
        let features = collection.features_at(2);

        assert_eq!(features.dim(), (3, 2));
        assert_eq!(features[[1, 1]], 112.0);
        assert_eq!(features[[2, 0]], 202.0);
    }

    #[test]
    fn test_select_keeps_order_and_duplicates() {
        let collection = small_collection();
        let subset = collection.select(&[2, 0, 2]);

        assert_eq!(subset.n_trials(), 3);
        assert_eq!(subset.data()[[0, 0, 0]], 200.0);
        assert_eq!(subset.data()[[1, 0, 0]], 0.0);
        assert_eq!(subset.metadata_value(0, "phonation"), Some("v"));
        assert_eq!(subset.metadata_value(1, "manner"), Some("f"));
        assert_eq!(subset.times(), collection.times());
    }
}
