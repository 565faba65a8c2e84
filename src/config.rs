// Analysis configuration
// Conditions, categories and processing settings, loaded from JSON with per-field defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::decoding::DecoderConfig;
use crate::epochs::{CategoryFilter, SelectionMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One recording to analyze: a stimulus presented in a given run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub stimulus: String,
    pub run: String,
}

impl Condition {
    pub fn new(stimulus: impl Into<String>, run: impl Into<String>) -> Self {
        Condition {
            stimulus: stimulus.into(),
            run: run.into(),
        }
    }

    /// `"{stimulus}_{run}"`, used for chart titles, file names and summary keys
    pub fn key(&self) -> String {
        format!("{}_{}", self.stimulus, self.run)
    }
}

/// A phoneme category to decode, with how it is drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Metadata field, e.g. `phonation`
    pub field: String,

    /// Value marking the positive class, e.g. `v`
    pub value: String,

    /// Legend label
    pub label: String,

    /// Line color as `#rrggbb`
    pub color: String,
}

impl CategorySpec {
    pub fn new(field: &str, value: &str, label: &str, color: &str) -> Self {
        CategorySpec {
            field: field.to_string(),
            value: value.to_string(),
            label: label.to_string(),
            color: color.to_string(),
        }
    }

    pub fn filter(&self) -> CategoryFilter {
        CategoryFilter::new(self.field.clone(), self.value.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

/// Full configuration of a decoding run
///
/// Every field is optional in the JSON file; missing fields take the values below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Candidate project roots, first existing directory wins
    pub root_candidates: Vec<PathBuf>,

    /// Frequency band directory name
    pub band: String,

    /// Epoch kind directory name
    pub epochs_kind: String,

    pub stimuli: Vec<String>,
    pub runs: Vec<String>,
    pub categories: Vec<CategorySpec>,

    /// Target sampling rate in Hz; `None` keeps the recorded rate
    pub resample_sfreq: Option<f64>,

    /// How the category subsets are combined before decoding
    pub selection: SelectionMode,

    /// Down-sample the majority class of each category before decoding
    pub balance_classes: bool,

    /// Attach annotation TSV rows to epoch files that carry no metadata
    pub attach_annotations: bool,

    pub decoder: DecoderConfig,

    pub render_plots: bool,
    pub image_format: ImageFormat,

    /// Summary CSV name, relative to the root
    pub summary_file: String,

    /// Optional JSONL progress trace
    pub trace_file: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            root_candidates: Vec::new(),
            band: "70-150Hz".to_string(),
            epochs_kind: "phoneme_epochs".to_string(),
            stimuli: [
                "Jobs1", "Jobs2", "Jobs3", "AttFast", "AttSlow", "BecFast", "BecSlow",
                "CampFast", "CampSlow",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            runs: vec!["run-01".to_string(), "run-02".to_string()],
            categories: vec![
                CategorySpec::new("phonation", "v", "Voiced", "#800080"),
                CategorySpec::new("manner", "f", "Fricatives", "#9400D3"),
                CategorySpec::new("place", "m", "Pure Vowel", "#BA55D3"),
            ],
            resample_sfreq: Some(100.0),
            selection: SelectionMode::Union,
            balance_classes: false,
            attach_annotations: true,
            decoder: DecoderConfig::default(),
            render_plots: true,
            image_format: ImageFormat::Png,
            summary_file: "accuracy_scores.csv".to_string(),
            trace_file: None,
        }
    }
}

impl AnalysisConfig {
    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid("no categories configured".to_string()));
        }

        if self.decoder.n_folds < 2 {
            return Err(ConfigError::Invalid(format!(
                "n_folds must be at least 2, got {}",
                self.decoder.n_folds
            )));
        }

        if !(self.decoder.logistic.c.is_finite() && self.decoder.logistic.c > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "logistic C must be positive, got {}",
                self.decoder.logistic.c
            )));
        }

        if let Some(sfreq) = self.resample_sfreq {
            if !(sfreq.is_finite() && sfreq > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "resample rate must be positive, got {}",
                    sfreq
                )));
            }
        }

        for category in &self.categories {
            if category.field.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category '{}' has an empty field",
                    category.label
                )));
            }
        }

        if self.summary_file.is_empty() {
            return Err(ConfigError::Invalid("summary_file is empty".to_string()));
        }

        Ok(())
    }

    /// Every (stimulus, run) pair, stimulus-major
    pub fn conditions(&self) -> Vec<Condition> {
        self.stimuli
            .iter()
            .flat_map(|stimulus| {
                self.runs
                    .iter()
                    .map(move |run| Condition::new(stimulus.as_str(), run.as_str()))
            })
            .collect()
    }

    pub fn category_filters(&self) -> Vec<CategoryFilter> {
        self.categories.iter().map(CategorySpec::filter).collect()
    }
}
