// Accuracy summary
// Accumulates per-condition curves during a run and writes them to one CSV

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::decoding::AccuracyCurve;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed summary row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

pub type ReportResult<T> = Result<T, ReportError>;

const HEADER: [&str; 2] = ["Key", "Accuracy Scores"];

/// The curve computed for one category of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCurve {
    /// Metadata field that was decoded
    pub field: String,

    /// Field value marking the positive class
    pub value: String,

    /// Legend label
    pub label: String,

    /// Line color as `#rrggbb`
    pub color: String,

    pub curve: AccuracyCurve,
}

/// One line of the summary CSV
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// `"{stimulus}_{run}_{field}_{value}"`
    pub key: String,
    pub scores: Vec<f64>,
}

/// Curves of every processed condition, in processing order
#[derive(Debug, Clone, Default)]
pub struct AccuracyRecord {
    conditions: Vec<(String, Vec<CategoryCurve>)>,
}

impl AccuracyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the curves of a condition, replacing any earlier entry for the same key
    pub fn insert(&mut self, condition_key: impl Into<String>, curves: Vec<CategoryCurve>) {
        let key = condition_key.into();
        match self.conditions.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = curves,
            None => self.conditions.push((key, curves)),
        }
    }

    pub fn get(&self, condition_key: &str) -> Option<&[CategoryCurve]> {
        self.conditions
            .iter()
            .find(|(k, _)| k == condition_key)
            .map(|(_, curves)| curves.as_slice())
    }

    /// Number of conditions recorded
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Flatten to one row per (condition, category)
    pub fn rows(&self) -> Vec<SummaryRow> {
        self.conditions
            .iter()
            .flat_map(|(condition, curves)| {
                curves.iter().map(move |c| SummaryRow {
                    key: format!("{}_{}_{}", condition, c.field, c.value),
                    scores: c.curve.scores().to_vec(),
                })
            })
            .collect()
    }

    /// Write the summary CSV, replacing any existing file
    ///
    /// Returns the number of data rows written.
    pub fn write_csv(&self, path: &Path) -> ReportResult<usize> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(HEADER)?;

        let rows = self.rows();
        for row in &rows {
            let scores = serde_json::to_string(&row.scores)?;
            writer.write_record([row.key.as_str(), scores.as_str()])?;
        }
        writer.flush()?;

        log::info!("Wrote {} accuracy rows to {}", rows.len(), path.display());
        Ok(rows.len())
    }

    /// Read a summary CSV written by [`AccuracyRecord::write_csv`]
    pub fn read_csv(path: &Path) -> ReportResult<Vec<SummaryRow>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();

        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let (key, scores) = match (record.get(0), record.get(1)) {
                (Some(key), Some(scores)) => (key, scores),
                _ => {
                    return Err(ReportError::Malformed {
                        row: index + 1,
                        reason: format!("expected 2 columns, found {}", record.len()),
                    })
                }
            };

            rows.push(SummaryRow {
                key: key.to_string(),
                scores: serde_json::from_str(scores)?,
            });
        }

        Ok(rows)
    }
}
