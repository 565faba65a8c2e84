// Pipeline progress tracing
// Append-only JSONL trace file recording each condition's stages

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Stages of the decoding run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Resample,
    Decode,
    Plot,
    Summary,
    Skip,
}

/// A single trace entry in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    pub stage: Stage,

    /// Condition key (`"{stimulus}_{run}"`); absent for run-wide entries
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub condition: Option<String>,

    /// Progress of the whole run [0.0, 1.0]
    pub progress: f32,

    /// Human-readable message describing current operation
    pub message: String,

    /// Optional structured data (e.g. trial counts, peak scores)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Create a new trace entry with current timestamp
    pub fn new(stage: Stage, progress: f32, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            condition: None,
            progress: progress.clamp(0.0, 1.0),
            message,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Run trace writer
/// Manages append-only JSONL trace file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry to the file
    /// Creates file if it doesn't exist
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        let json_line = entry.to_json_line()?;
        file.write_all(json_line.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Helper builder for creating trace entries
pub struct TraceBuilder {
    stage: Stage,
    condition: Option<String>,
}

impl TraceBuilder {
    /// Start building a trace entry for a stage
    pub fn stage(stage: Stage) -> Self {
        TraceBuilder {
            stage,
            condition: None,
        }
    }

    pub fn condition(mut self, key: impl Into<String>) -> Self {
        self.condition = Some(key.into());
        self
    }

    /// Create a progress entry
    pub fn progress(self, progress: f32, message: impl Into<String>) -> TraceEntry {
        let mut entry = TraceEntry::new(self.stage, progress, message.into());
        entry.condition = self.condition;
        entry
    }

    /// Create an entry with data
    pub fn with_data(
        self,
        progress: f32,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> TraceEntry {
        self.progress(progress, message).with_data(data)
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_progress_clamping() {
        let low = TraceEntry::new(Stage::Load, -0.5, "test".to_string());
        assert_eq!(low.progress, 0.0);

        let high = TraceEntry::new(Stage::Load, 1.5, "test".to_string());
        assert_eq!(high.progress, 1.0);
    }

    #[test]
    fn test_builder_sets_condition() {
        let entry = TraceBuilder::stage(Stage::Decode)
            .condition("Jobs1_run-01")
            .progress(0.25, "Decoding phonation");

        assert_eq!(entry.stage, Stage::Decode);
        assert_eq!(entry.condition.as_deref(), Some("Jobs1_run-01"));
        assert_eq!(entry.message, "Decoding phonation");
        assert!(entry.data.is_none());
    }

    #[test]
    fn test_json_line_format() {
        let entry = TraceBuilder::stage(Stage::Skip).progress(0.5, "File does not exist");
        let json_line = entry.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));
        assert!(json_line.contains("\"stage\":\"skip\""));
        // Run-wide entries leave the condition out
        assert!(!json_line.contains("condition"));
    }

    #[test]
    fn test_trace_writer_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");
        let writer = TraceWriter::new(trace_path.clone());

        writer
            .write(&TraceBuilder::stage(Stage::Load).condition("Jobs1_run-01").progress(0.0, "Loading"))
            .unwrap();
        writer
            .write(&TraceBuilder::stage(Stage::Decode).with_data(
                0.5,
                "Decoded",
                serde_json::json!({ "peak": 0.81, "trials": 40 }),
            ))
            .unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage, Stage::Load);
        assert_eq!(entries[0].condition.as_deref(), Some("Jobs1_run-01"));
        assert_eq!(entries[1].data.as_ref().unwrap()["trials"], 40);
        assert_eq!(writer.path(), trace_path.as_path());
    }
}
