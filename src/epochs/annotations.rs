// Phoneme annotation tables
// Tab-separated phoneme rows that supply per-trial metadata

use std::io::Read;
use std::path::Path;

use crate::epochs::types::{EpochError, EpochResult, TrialCollection, TrialMetadata};

/// Rows of a phoneme annotation table, one per phoneme event
#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    columns: Vec<String>,
    rows: Vec<TrialMetadata>,
}

impl AnnotationTable {
    /// Read a TSV file with a header row
    pub fn read_tsv(path: &Path) -> EpochResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse TSV content from any reader
    /// Empty cells are left out of the row, so they never match a category value.
    pub fn from_reader<R: Read>(reader: R) -> EpochResult<Self> {
        let mut tsv = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = tsv.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in tsv.records() {
            let record = record?;
            let row = columns
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.is_empty())
                .map(|(column, value)| (column.clone(), value.to_string()))
                .collect();
            rows.push(row);
        }

        Ok(AnnotationTable { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TrialMetadata] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Use the table rows as trial metadata, row i describing trial i
    pub fn attach_to(&self, collection: &mut TrialCollection) -> EpochResult<()> {
        if self.rows.len() != collection.n_trials() {
            return Err(EpochError::MetadataMismatch {
                expected: collection.n_trials(),
                found: self.rows.len(),
            });
        }
        collection.set_metadata(self.rows.clone())
    }
}
