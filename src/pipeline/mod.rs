// Pipeline execution and monitoring module
// Orchestrates decoding across conditions, the accuracy summary and the progress trace

pub mod report;
pub mod runner;
pub mod trace;

pub use report::{AccuracyRecord, CategoryCurve, ReportError, SummaryRow};
pub use runner::{AnalysisRunner, ConditionError, ConditionStatus, RunError, RunResult, RunSummary};
pub use trace::{read_trace_file, Stage, TraceBuilder, TraceEntry, TraceError, TraceWriter};
