// Phoneme Decoding - time-resolved decoding of phoneme categories from iEEG epochs
// Module declarations

pub mod config;
pub mod decoding;
pub mod epochs;
pub mod paths;
pub mod pipeline;
pub mod plot;

pub use config::{AnalysisConfig, CategorySpec, Condition, ConfigError, ImageFormat};
pub use decoding::{AccuracyCurve, DecodeError, DecoderConfig, TimeResolvedDecoder};
pub use epochs::{CategoryFilter, EpochError, SelectionMode, TrialCollection};
pub use paths::{resolve_root, PathError, PathLayout};
pub use pipeline::{AccuracyRecord, AnalysisRunner, RunError, RunSummary};

use std::path::PathBuf;

/// Resolve the root among `root_candidates` and the configured ones, then run every condition
pub fn run_analysis(
    config: AnalysisConfig,
    root_candidates: &[PathBuf],
) -> Result<RunSummary, RunError> {
    let runner = AnalysisRunner::from_candidates(config, root_candidates)?;
    runner.run()
}
