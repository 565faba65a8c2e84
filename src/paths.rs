// Project directory layout
// Root resolution and the fixed derivatives/annotations/vis naming convention

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{AnalysisConfig, Condition, ImageFormat};

#[derive(Debug, Error)]
pub enum PathError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No valid root directory found among {0:?}")]
    NoRootDirectory(Vec<PathBuf>),
}

pub type PathResult<T> = Result<T, PathError>;

/// First candidate that exists as a directory
pub fn resolve_root(candidates: &[PathBuf]) -> PathResult<PathBuf> {
    candidates
        .iter()
        .find(|candidate| candidate.is_dir())
        .cloned()
        .ok_or_else(|| PathError::NoRootDirectory(candidates.to_vec()))
}

/// File locations under a resolved project root
#[derive(Debug, Clone)]
pub struct PathLayout {
    root: PathBuf,
    band: String,
    epochs_kind: String,
}

impl PathLayout {
    pub fn new(root: PathBuf, band: impl Into<String>, epochs_kind: impl Into<String>) -> Self {
        PathLayout {
            root,
            band: band.into(),
            epochs_kind: epochs_kind.into(),
        }
    }

    pub fn from_config(root: PathBuf, config: &AnalysisConfig) -> Self {
        Self::new(root, config.band.clone(), config.epochs_kind.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `derivatives/concatenated/{band}/{kind}/phoneme-epo-{stimulus}-{run}-epo.json`
    pub fn epochs_path(&self, condition: &Condition) -> PathBuf {
        self.root
            .join("derivatives")
            .join("concatenated")
            .join(&self.band)
            .join(&self.epochs_kind)
            .join(format!(
                "phoneme-epo-{}-{}-epo.json",
                condition.stimulus, condition.run
            ))
    }

    /// `annotations/phonemes/tsv/{stimulus}-phonemes.tsv`
    pub fn annotations_path(&self, stimulus: &str) -> PathBuf {
        self.root
            .join("annotations")
            .join("phonemes")
            .join("tsv")
            .join(format!("{}-phonemes.tsv", stimulus))
    }

    /// `vis/concatenated/{band}/phoneme`
    pub fn figure_dir(&self) -> PathBuf {
        self.root
            .join("vis")
            .join("concatenated")
            .join(&self.band)
            .join("phoneme")
    }

    /// Create the figure directory if needed
    pub fn ensure_figure_dir(&self) -> PathResult<PathBuf> {
        let dir = self.figure_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn figure_path(&self, condition: &Condition, format: ImageFormat) -> PathBuf {
        self.figure_dir().join(format!(
            "{}_logistic.{}",
            condition.key(),
            format.extension()
        ))
    }

    pub fn summary_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_first_existing_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        let present = temp_dir.path().to_path_buf();

        let root = resolve_root(&[missing.clone(), present.clone()]).unwrap();
        assert_eq!(root, present);

        let result = resolve_root(&[missing]);
        assert!(matches!(result, Err(PathError::NoRootDirectory(ref c)) if c.len() == 1));
    }

    #[test]
    fn test_layout_paths() {
        let layout = PathLayout::new(PathBuf::from("/data"), "70-150Hz", "phoneme_epochs");
        let condition = Condition::new("Jobs1", "run-01");

        assert_eq!(
            layout.epochs_path(&condition),
            PathBuf::from(
                "/data/derivatives/concatenated/70-150Hz/phoneme_epochs/phoneme-epo-Jobs1-run-01-epo.json"
            )
        );
        assert_eq!(
            layout.annotations_path("Jobs1"),
            PathBuf::from("/data/annotations/phonemes/tsv/Jobs1-phonemes.tsv")
        );
        assert_eq!(
            layout.figure_path(&condition, ImageFormat::Png),
            PathBuf::from("/data/vis/concatenated/70-150Hz/phoneme/Jobs1_run-01_logistic.png")
        );
        assert_eq!(
            layout.summary_path("accuracy_scores.csv"),
            PathBuf::from("/data/accuracy_scores.csv")
        );
    }

    #[test]
    fn test_ensure_figure_dir() {
        let temp_dir = TempDir::new().unwrap();
        let layout = PathLayout::new(temp_dir.path().to_path_buf(), "70-150Hz", "phoneme_epochs");

        let dir = layout.ensure_figure_dir().unwrap();
        assert!(dir.is_dir());
    }
}
