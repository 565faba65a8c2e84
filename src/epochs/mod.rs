// Epoch handling module
// Trial collections, container/annotation ingestion, resampling and category selection

pub mod annotations;
pub mod ingest;
pub mod resample;
pub mod select;
pub mod types;

pub use annotations::AnnotationTable;
pub use ingest::{read_epochs, write_epochs, EpochFile};
pub use resample::{resample, Resampler};
pub use select::{balance_classes, select_trials, selected_indices, CategoryFilter, SelectionMode};
pub use types::{EpochError, EpochResult, TrialCollection, TrialMetadata};
