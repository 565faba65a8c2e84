// Analysis runner
// Walks every (stimulus, run) condition: load, resample, select, decode per category, plot, summarize

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{AnalysisConfig, CategorySpec, Condition, ConfigError};
use crate::decoding::{DecodeError, TimeResolvedDecoder};
use crate::epochs::{
    balance_classes, read_epochs, resample, select_trials, AnnotationTable, EpochError,
    TrialCollection,
};
use crate::paths::{resolve_root, PathError, PathLayout};
use crate::pipeline::report::{AccuracyRecord, CategoryCurve, ReportError};
use crate::pipeline::trace::{Stage, TraceBuilder, TraceEntry, TraceWriter};
use crate::plot::{parse_color, render_decoding_chart, ChartSeries};

/// Errors that stop a whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Summary error: {0}")]
    Report(#[from] ReportError),
}

pub type RunResult<T> = Result<T, RunError>;

/// Errors that end the processing of one condition
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("Epoch error: {0}")]
    Epoch(#[from] EpochError),

    #[error("Path error: {0}")]
    Path(#[from] PathError),
}

/// Outcome of one condition
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionStatus {
    /// Decoded; `categories` curves were recorded
    Processed { categories: usize },

    /// Nothing to decode (missing file, no matching trials, no decodable category)
    Skipped { reason: String },

    /// The input exists but could not be read
    Failed { reason: String },
}

/// What a run did, condition by condition
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub rows_written: usize,
    pub summary_path: PathBuf,
}

pub struct AnalysisRunner {
    config: AnalysisConfig,
    layout: PathLayout,
    decoder: TimeResolvedDecoder,
    trace: Option<TraceWriter>,
}

impl AnalysisRunner {
    /// Runner over an already resolved project root
    pub fn new(config: AnalysisConfig, root: PathBuf) -> Self {
        let layout = PathLayout::from_config(root, &config);
        let decoder = TimeResolvedDecoder::new(config.decoder.clone());
        let trace = config.trace_file.clone().map(TraceWriter::new);
        AnalysisRunner {
            config,
            layout,
            decoder,
            trace,
        }
    }

    /// Resolve the root from `candidates` followed by the configured ones
    pub fn from_candidates(config: AnalysisConfig, candidates: &[PathBuf]) -> RunResult<Self> {
        config.validate()?;

        let all: Vec<PathBuf> = candidates
            .iter()
            .chain(config.root_candidates.iter())
            .cloned()
            .collect();
        let root = resolve_root(&all)?;
        log::info!("Using root directory {}", root.display());

        Ok(Self::new(config, root))
    }

    pub fn with_trace(mut self, path: PathBuf) -> Self {
        self.trace = Some(TraceWriter::new(path));
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    /// Process every condition, then write the summary CSV once
    pub fn run(&self) -> RunResult<RunSummary> {
        let conditions = self.config.conditions();
        let total = conditions.len().max(1) as f32;
        let mut record = AccuracyRecord::new();
        let mut summary = RunSummary::default();

        for (index, condition) in conditions.iter().enumerate() {
            let progress = index as f32 / total;
            let key = condition.key();

            let status = match self.process_condition(condition, &mut record, progress) {
                Ok(status) => status,
                Err(e) => {
                    log::error!("Failed to process {}: {}", key, e);
                    ConditionStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            match status {
                ConditionStatus::Processed { .. } => summary.processed.push(key),
                ConditionStatus::Skipped { ref reason } => {
                    self.trace_skip(&key, progress, reason);
                    summary.skipped.push(key);
                }
                ConditionStatus::Failed { ref reason } => {
                    self.trace_skip(&key, progress, reason);
                    summary.failed.push(key);
                }
            }
        }

        let summary_path = self.layout.summary_path(&self.config.summary_file);
        summary.rows_written = record.write_csv(&summary_path)?;
        summary.summary_path = summary_path;

        log::info!(
            "Decoding finished: {} processed, {} skipped, {} failed",
            summary.processed.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        self.trace(TraceBuilder::stage(Stage::Summary).with_data(
            1.0,
            format!("Wrote {} rows", summary.rows_written),
            serde_json::json!({
                "processed": summary.processed.len(),
                "skipped": summary.skipped.len(),
                "failed": summary.failed.len(),
            }),
        ));

        Ok(summary)
    }

    /// Decode one condition and add its curves to `record`
    pub fn process_condition(
        &self,
        condition: &Condition,
        record: &mut AccuracyRecord,
        progress: f32,
    ) -> Result<ConditionStatus, ConditionError> {
        let key = condition.key();
        let epochs_path = self.layout.epochs_path(condition);

        if !epochs_path.exists() {
            log::warn!("File does not exist: {}, skipping...", epochs_path.display());
            return Ok(ConditionStatus::Skipped {
                reason: format!("File does not exist: {}", epochs_path.display()),
            });
        }

        log::info!("Processing file: {}", epochs_path.display());
        self.trace(
            TraceBuilder::stage(Stage::Load)
                .condition(key.as_str())
                .progress(progress, format!("Loading {}", epochs_path.display())),
        );

        let mut epochs = read_epochs(&epochs_path)?;
        self.attach_annotations(condition, &mut epochs)?;

        if let Some(target) = self.config.resample_sfreq {
            let original = epochs.sfreq();
            resample(&mut epochs, target)?;
            log::debug!("Resampled {} from {} Hz to {} Hz", key, original, target);
            self.trace(
                TraceBuilder::stage(Stage::Resample)
                    .condition(key.as_str())
                    .with_data(
                        progress,
                        format!("Resampled to {} Hz", target),
                        serde_json::json!({
                            "from_hz": original,
                            "to_hz": target,
                            "samples": epochs.n_times(),
                        }),
                    ),
            );
        }

        let filters = self.config.category_filters();
        let selected = select_trials(&epochs, &filters, self.config.selection);
        if selected.n_trials() == 0 {
            log::warn!("No trials of {} match any category, skipping...", key);
            return Ok(ConditionStatus::Skipped {
                reason: "no trials match any category".to_string(),
            });
        }
        log::info!(
            "Selected {} of {} trials for {}",
            selected.n_trials(),
            epochs.n_trials(),
            key
        );

        let curves = self.decode_categories(&selected, condition, progress);
        if curves.is_empty() {
            log::warn!("No category of {} could be decoded, skipping...", key);
            return Ok(ConditionStatus::Skipped {
                reason: "no category could be decoded".to_string(),
            });
        }

        if self.config.render_plots {
            self.plot_condition(condition, &curves, progress)?;
        }

        let categories = curves.len();
        record.insert(key, curves);
        Ok(ConditionStatus::Processed { categories })
    }

    /// Decode every configured category of one condition
    ///
    /// Categories whose labels cannot be decoded are logged and left out.
    pub fn decode_categories(
        &self,
        selected: &TrialCollection,
        condition: &Condition,
        progress: f32,
    ) -> Vec<CategoryCurve> {
        let key = condition.key();
        let mut curves = Vec::new();

        for (index, category) in self.config.categories.iter().enumerate() {
            let labels = selected.labels_for(&category.field, &category.value);

            let result = if self.config.balance_classes {
                let seed = self.config.decoder.seed.wrapping_add(index as u64);
                let mut rng = StdRng::seed_from_u64(seed);
                let indices = balance_classes(&labels, &mut rng);
                let subset = selected.select(&indices);
                let subset_labels: Vec<bool> = indices.iter().map(|&i| labels[i]).collect();
                self.decoder.decode(&subset, &subset_labels)
            } else {
                self.decoder.decode(selected, &labels)
            };

            match result {
                Ok(curve) => {
                    let peak = curve.peak();
                    log::info!(
                        "{} {}: peak ROC-AUC {:.3} at {:.0} ms",
                        key,
                        category.label,
                        peak.map(|p| p.1).unwrap_or(f64::NAN),
                        peak.map(|p| p.0 * 1000.0).unwrap_or(f64::NAN)
                    );
                    self.trace(
                        TraceBuilder::stage(Stage::Decode)
                            .condition(key.as_str())
                            .with_data(
                                progress,
                                format!("Decoded {}", category.field),
                                serde_json::json!({
                                    "field": category.field,
                                    "positives": labels.iter().filter(|&&l| l).count(),
                                    "trials": labels.len(),
                                    "mean": curve.mean(),
                                    "peak": peak.map(|p| p.1),
                                }),
                            ),
                    );
                    curves.push(CategoryCurve {
                        field: category.field.clone(),
                        value: category.value.clone(),
                        label: category.label.clone(),
                        color: category.color.clone(),
                        curve,
                    });
                }
                Err(e) => log_decode_skip(&key, category, &e),
            }
        }

        curves
    }

    fn attach_annotations(
        &self,
        condition: &Condition,
        epochs: &mut TrialCollection,
    ) -> Result<(), ConditionError> {
        if epochs.has_metadata() || !self.config.attach_annotations {
            return Ok(());
        }

        let path = self.layout.annotations_path(&condition.stimulus);
        if !path.exists() {
            log::warn!(
                "Epochs of {} carry no metadata and {} does not exist",
                condition.key(),
                path.display()
            );
            return Ok(());
        }

        let table = AnnotationTable::read_tsv(&path)?;
        table.attach_to(epochs)?;
        log::debug!("Attached {} annotation rows from {}", table.len(), path.display());
        Ok(())
    }

    fn plot_condition(
        &self,
        condition: &Condition,
        curves: &[CategoryCurve],
        progress: f32,
    ) -> Result<(), ConditionError> {
        self.layout.ensure_figure_dir()?;
        let path = self.layout.figure_path(condition, self.config.image_format);

        let colors: Vec<_> = curves
            .iter()
            .map(|c| {
                parse_color(&c.color).unwrap_or_else(|e| {
                    log::warn!("{}; drawing {} in black", e, c.label);
                    plotters::style::BLACK
                })
            })
            .collect();

        let series: Vec<ChartSeries<'_>> = curves
            .iter()
            .zip(colors)
            .map(|(c, color)| ChartSeries {
                label: &c.label,
                color,
                curve: &c.curve,
            })
            .collect();

        let title = format!("Decoding Accuracy for {}", condition.key());
        match render_decoding_chart(&path, &title, &series, self.config.image_format) {
            Ok(()) => {
                log::info!("Saved chart to {}", path.display());
                self.trace(
                    TraceBuilder::stage(Stage::Plot)
                        .condition(condition.key())
                        .progress(progress, format!("Saved {}", path.display())),
                );
            }
            Err(e) => log::warn!("Failed to render chart {}: {}", path.display(), e),
        }

        Ok(())
    }

    fn trace_skip(&self, key: &str, progress: f32, reason: &str) {
        self.trace(
            TraceBuilder::stage(Stage::Skip)
                .condition(key)
                .progress(progress, reason),
        );
    }

    /// Trace failures never stop a run
    fn trace(&self, entry: TraceEntry) {
        if let Some(writer) = &self.trace {
            if let Err(e) = writer.write(&entry) {
                log::warn!("Failed to write trace to {}: {}", writer.path().display(), e);
            }
        }
    }
}

fn log_decode_skip(key: &str, category: &CategorySpec, error: &DecodeError) {
    match error {
        DecodeError::DegenerateLabels { .. } | DecodeError::TooFewTrials { .. } => {
            log::warn!("Skipping {} {} ({}): {}", key, category.label, category.field, error)
        }
        _ => log::error!("Decoding {} {} failed: {}", key, category.label, error),
    }
}
