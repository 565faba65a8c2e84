// Epoch container ingestion
// Reads and writes the JSON container holding concatenated phoneme epochs

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::epochs::types::{EpochError, EpochResult, TrialCollection, TrialMetadata};

/// On-disk layout of an epoch container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochFile {
    /// Sampling frequency in Hz
    pub sfreq: f64,

    /// Time of the first sample relative to the event, in seconds
    pub tmin: f64,

    /// Channel names, one per row of every trial
    pub ch_names: Vec<String>,

    /// Signal as `[trial][channel][time]`
    pub data: Vec<Vec<Vec<f64>>>,

    /// Per-trial metadata; values may be strings, numbers or booleans
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<BTreeMap<String, serde_json::Value>>,
}

impl EpochFile {
    /// Snapshot a collection into its container form
    pub fn from_collection(collection: &TrialCollection) -> Self {
        let data: Vec<Vec<Vec<f64>>> = collection
            .data()
            .outer_iter()
            .map(|trial| trial.outer_iter().map(|row| row.to_vec()).collect())
            .collect();

        let metadata: Vec<BTreeMap<String, serde_json::Value>> = if collection.has_metadata() {
            collection
                .metadata()
                .iter()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                        .collect()
                })
                .collect()
        } else {
            Vec::new()
        };

        EpochFile {
            sfreq: collection.sfreq(),
            tmin: collection.tmin(),
            ch_names: collection.channel_names().to_vec(),
            data,
            metadata,
        }
    }

    /// Validate the nested signal and build a trial collection
    pub fn into_collection(self) -> EpochResult<TrialCollection> {
        let n_trials = self.data.len();
        let n_channels = self.ch_names.len();
        let n_times = self
            .data
            .first()
            .and_then(|trial| trial.first())
            .map(Vec::len)
            .unwrap_or(0);

        let mut flat = Vec::with_capacity(n_trials * n_channels * n_times);
        for (trial_idx, trial) in self.data.into_iter().enumerate() {
            if trial.len() != n_channels {
                return Err(EpochError::ShapeMismatch(format!(
                    "trial {} has {} channels, expected {}",
                    trial_idx,
                    trial.len(),
                    n_channels
                )));
            }
            for (ch_idx, row) in trial.into_iter().enumerate() {
                if row.len() != n_times {
                    return Err(EpochError::ShapeMismatch(format!(
                        "trial {} channel {} has {} samples, expected {}",
                        trial_idx,
                        ch_idx,
                        row.len(),
                        n_times
                    )));
                }
                flat.extend(row);
            }
        }

        let data = Array3::from_shape_vec((n_trials, n_channels, n_times), flat)
            .map_err(|e| EpochError::ShapeMismatch(e.to_string()))?;

        let metadata = if self.metadata.is_empty() {
            vec![TrialMetadata::new(); n_trials]
        } else {
            self.metadata.into_iter().map(stringify_metadata).collect()
        };

        TrialCollection::with_tmin(data, self.tmin, self.sfreq, self.ch_names, metadata)
    }
}

/// Flatten JSON metadata values to strings; nulls are treated as missing
fn stringify_metadata(row: BTreeMap<String, serde_json::Value>) -> TrialMetadata {
    row.into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

/// Load an epoch container from disk
pub fn read_epochs(path: &Path) -> EpochResult<TrialCollection> {
    let file = File::open(path)?;
    let epoch_file: EpochFile = serde_json::from_reader(BufReader::new(file))?;
    epoch_file.into_collection()
}

/// Write a collection as an epoch container
pub fn write_epochs(path: &Path, collection: &TrialCollection) -> EpochResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &EpochFile::from_collection(collection))?;
    writer.flush()?;
    Ok(())
}
