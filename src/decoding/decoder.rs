// Time-resolved binary decoder
// Cross-validated ROC-AUC of a scaled logistic model, fitted independently at every time sample

use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::decoding::folds::{make_folds, Fold, FoldStrategy};
use crate::decoding::logistic::{LogisticConfig, ScaledLogistic};
use crate::decoding::metrics::roc_auc;
use crate::decoding::types::{AccuracyCurve, DecodeError, DecodeResult};
use crate::epochs::TrialCollection;

/// Cross-validation and classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Number of cross-validation folds (K)
    pub n_folds: usize,

    /// Shuffle trials before assigning folds
    pub shuffle: bool,

    /// Fold assignment strategy
    pub strategy: FoldStrategy,

    /// Seed for fold shuffling; the same seed gives the same curve
    pub seed: u64,

    /// Logistic regression solver settings
    pub logistic: LogisticConfig,

    /// Evaluate the folds of one time sample concurrently
    pub parallel_folds: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            n_folds: 5,
            shuffle: true,
            strategy: FoldStrategy::Stratified,
            seed: 42,
            logistic: LogisticConfig::default(),
            parallel_folds: true,
        }
    }
}

/// Held-out result of one fold
#[derive(Debug, Clone)]
struct FoldOutcome {
    /// `None` when the held-out trials hold a single class
    auc: Option<f64>,

    /// Decision scores of the held-out trials, in `Fold::test` order
    scores: Vec<f64>,
}

/// Decodes a binary label from channel activity, one time sample at a time
///
/// Folds are drawn once per call and reused at every sample, so the curve
/// only reflects how the signal changes over time. Fold AUCs are averaged over
/// the folds whose held-out set contains both classes; when no fold qualifies
/// (for example one trial per fold) the held-out scores of all folds are pooled
/// and scored together.
pub struct TimeResolvedDecoder {
    config: DecoderConfig,
}

impl TimeResolvedDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        TimeResolvedDecoder { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Compute the accuracy curve of `labels` over the collection's time axis
    pub fn decode(
        &self,
        collection: &TrialCollection,
        labels: &[bool],
    ) -> DecodeResult<AccuracyCurve> {
        let trials = collection.n_trials();
        self.validate(labels, trials)?;

        let folds = make_folds(
            self.config.strategy,
            labels,
            self.config.n_folds,
            self.config.shuffle,
            self.config.seed,
        )?;

        let scores = (0..collection.n_times())
            .map(|sample| self.score_sample(collection.features_at(sample), labels, &folds, sample))
            .collect::<DecodeResult<Vec<f64>>>()?;

        log::debug!(
            "Decoded {} trials x {} channels over {} samples with {} folds",
            trials,
            collection.n_channels(),
            scores.len(),
            folds.len()
        );

        Ok(AccuracyCurve::new(collection.times().to_vec(), scores))
    }

    /// Check the label vector before any fitting
    pub fn validate(&self, labels: &[bool], trials: usize) -> DecodeResult<()> {
        if labels.len() != trials {
            return Err(DecodeError::LabelLengthMismatch {
                labels: labels.len(),
                trials,
            });
        }

        let k = self.config.n_folds;
        if k < 2 {
            return Err(DecodeError::InvalidFoldCount(k));
        }
        if trials < k {
            return Err(DecodeError::TooFewTrials { trials, folds: k });
        }

        let positives = labels.iter().filter(|&&l| l).count();
        if positives == 0 || positives == trials {
            return Err(DecodeError::DegenerateLabels { positives, trials });
        }

        Ok(())
    }

    /// Cross-validated ROC-AUC for one `[trials, channels]` feature matrix
    pub fn score_sample(
        &self,
        features: ArrayView2<'_, f64>,
        labels: &[bool],
        folds: &[Fold],
        sample: usize,
    ) -> DecodeResult<f64> {
        let outcomes: Vec<FoldOutcome> = if self.config.parallel_folds {
            folds
                .par_iter()
                .map(|fold| self.evaluate_fold(features, labels, fold))
                .collect::<DecodeResult<_>>()?
        } else {
            folds
                .iter()
                .map(|fold| self.evaluate_fold(features, labels, fold))
                .collect::<DecodeResult<_>>()?
        };

        let defined: Vec<f64> = outcomes.iter().filter_map(|o| o.auc).collect();
        if !defined.is_empty() {
            return Ok(defined.iter().sum::<f64>() / defined.len() as f64);
        }

        let mut pooled = vec![0.0; labels.len()];
        for (fold, outcome) in folds.iter().zip(&outcomes) {
            for (&trial, &score) in fold.test.iter().zip(&outcome.scores) {
                pooled[trial] = score;
            }
        }
        roc_auc(&pooled, labels).ok_or(DecodeError::Unscorable(sample))
    }

    fn evaluate_fold(
        &self,
        features: ArrayView2<'_, f64>,
        labels: &[bool],
        fold: &Fold,
    ) -> DecodeResult<FoldOutcome> {
        let x_train = features.select(Axis(0), &fold.train);
        let y_train: Vec<bool> = fold.train.iter().map(|&i| labels[i]).collect();
        let model = ScaledLogistic::fit(x_train.view(), &y_train, &self.config.logistic)?;

        let x_test = features.select(Axis(0), &fold.test);
        let y_test: Vec<bool> = fold.test.iter().map(|&i| labels[i]).collect();
        let scores = model.decision_function(x_test.view()).to_vec();

        Ok(FoldOutcome {
            auc: roc_auc(&scores, &y_test),
            scores,
        })
    }
}

impl Default for TimeResolvedDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epochs::TrialMetadata;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn collection_from(data: Array3<f64>) -> TrialCollection {
        let (n, c, _) = data.dim();
        TrialCollection::with_tmin(
            data,
            0.0,
            100.0,
            (0..c).map(|i| format!("ch{}", i)).collect(),
            vec![TrialMetadata::new(); n],
        )
        .unwrap()
    }

    fn alternating_labels(n: usize) -> Vec<bool> {
        (0..n).map(|i| i % 2 == 0).collect()
    }

    #[test]
    fn test_chance_level_on_noise() {
        let mut rng = StdRng::seed_from_u64(2024);
        let data = Array3::from_shape_fn((200, 4, 6), |_| rng.random_range(-1.0..1.0));
        let labels: Vec<bool> = (0..200).map(|_| rng.random_bool(0.5)).collect();

        let curve = TimeResolvedDecoder::default()
            .decode(&collection_from(data), &labels)
            .unwrap();

        assert_eq!(curve.len(), 6);
        for &score in curve.scores() {
            assert!((score - 0.5).abs() < 0.2, "score {} too far from chance", score);
        }
        assert!((curve.mean().unwrap() - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_separable_sample_scores_one() {
        let labels = alternating_labels(20);
        let mut rng = StdRng::seed_from_u64(5);
        let data = Array3::from_shape_fn((20, 3, 4), |(trial, _, t)| {
            if t == 2 {
                if labels[trial] { 1.0 } else { 0.0 }
            } else {
                rng.random_range(-1.0..1.0)
            }
        });

        let curve = TimeResolvedDecoder::default()
            .decode(&collection_from(data), &labels)
            .unwrap();

        assert_eq!(curve.scores()[2], 1.0);
    }

    #[test]
    fn test_fixed_seed_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(77);
        let data = Array3::from_shape_fn((30, 4, 5), |_| rng.random_range(-1.0..1.0));
        let labels = alternating_labels(30);
        let collection = collection_from(data);

        let decoder = TimeResolvedDecoder::default();
        let first = decoder.decode(&collection, &labels).unwrap();
        let second = decoder.decode(&collection, &labels).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(8);
        let data = Array3::from_shape_fn((25, 3, 4), |_| rng.random_range(-1.0..1.0));
        let labels = alternating_labels(25);
        let collection = collection_from(data);

        let parallel = TimeResolvedDecoder::default().decode(&collection, &labels).unwrap();
        let sequential = TimeResolvedDecoder::new(DecoderConfig {
            parallel_folds: false,
            ..DecoderConfig::default()
        })
        .decode(&collection, &labels)
        .unwrap();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_n_equal_to_k_succeeds() {
        let labels = vec![true, false, true, false, false];
        let data = Array3::from_shape_fn((5, 2, 3), |(trial, ch, t)| {
            (trial as f64 - 2.0) * (ch + 1) as f64 + t as f64
        });

        let curve = TimeResolvedDecoder::default()
            .decode(&collection_from(data), &labels)
            .unwrap();

        assert_eq!(curve.len(), 3);
        assert!(curve.scores().iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_n_less_than_k_fails() {
        let labels = vec![true, false, true, false];
        let data = Array3::zeros((4, 2, 3));

        let result = TimeResolvedDecoder::default().decode(&collection_from(data), &labels);
        assert!(matches!(
            result,
            Err(DecodeError::TooFewTrials { trials: 4, folds: 5 })
        ));
    }

    #[test]
    fn test_constant_labels_fail() {
        let data = Array3::zeros((10, 2, 3));
        let result = TimeResolvedDecoder::default().decode(&collection_from(data), &[true; 10]);
        assert!(matches!(
            result,
            Err(DecodeError::DegenerateLabels { positives: 10, trials: 10 })
        ));
    }

    #[test]
    fn test_unstratified_folds_stay_in_range() {
        // Imbalanced labels with plain K-fold: some folds see one class only
        let labels: Vec<bool> = (0..12).map(|i| i < 3).collect();
        let mut rng = StdRng::seed_from_u64(13);
        let data = Array3::from_shape_fn((12, 2, 3), |_| rng.random_range(-1.0..1.0));

        let decoder = TimeResolvedDecoder::new(DecoderConfig {
            strategy: FoldStrategy::KFold,
            shuffle: false,
            ..DecoderConfig::default()
        });
        let curve = decoder.decode(&collection_from(data), &labels).unwrap();

        assert!(curve.scores().iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_label_length_mismatch() {
        let data = Array3::zeros((10, 2, 3));
        let result = TimeResolvedDecoder::default().decode(&collection_from(data), &[true, false]);
        assert!(matches!(
            result,
            Err(DecodeError::LabelLengthMismatch { labels: 2, trials: 10 })
        ));
    }
}
