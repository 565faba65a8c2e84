// Cross-validation splitting
// K-fold and stratified K-fold partitions with seeded shuffling

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::decoding::types::{DecodeError, DecodeResult};

/// How trials are partitioned into folds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldStrategy {
    /// Contiguous blocks of (optionally shuffled) trials
    KFold,

    /// Each fold keeps the overall class proportions
    #[default]
    Stratified,
}

/// One train/test partition; both index lists are sorted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition `labels.len()` trials into `k` folds
pub fn make_folds(
    strategy: FoldStrategy,
    labels: &[bool],
    k: usize,
    shuffle: bool,
    seed: u64,
) -> DecodeResult<Vec<Fold>> {
    match strategy {
        FoldStrategy::KFold => k_fold(labels.len(), k, shuffle, seed),
        FoldStrategy::Stratified => stratified_k_fold(labels, k, shuffle, seed),
    }
}

/// Plain K-fold: the first `n % k` folds get one extra trial
pub fn k_fold(n: usize, k: usize, shuffle: bool, seed: u64) -> DecodeResult<Vec<Fold>> {
    check_fold_count(n, k)?;

    let mut order: Vec<usize> = (0..n).collect();
    if shuffle {
        order.shuffle(&mut StdRng::seed_from_u64(seed));
    }

    let mut assignment = vec![0; n];
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        for &trial in &order[start..start + size] {
            assignment[trial] = fold;
        }
        start += size;
    }

    Ok(folds_from_assignment(&assignment, k))
}

/// Stratified K-fold: trials of each class are dealt round-robin over the folds
pub fn stratified_k_fold(
    labels: &[bool],
    k: usize,
    shuffle: bool,
    seed: u64,
) -> DecodeResult<Vec<Fold>> {
    let n = labels.len();
    check_fold_count(n, k)?;

    let (mut positives, mut negatives): (Vec<usize>, Vec<usize>) =
        (0..n).partition(|&i| labels[i]);

    if shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        negatives.shuffle(&mut rng);
        positives.shuffle(&mut rng);
    }

    let mut assignment = vec![0; n];
    for (position, &trial) in negatives.iter().chain(positives.iter()).enumerate() {
        assignment[trial] = position % k;
    }

    Ok(folds_from_assignment(&assignment, k))
}

fn check_fold_count(n: usize, k: usize) -> DecodeResult<()> {
    if k < 2 {
        return Err(DecodeError::InvalidFoldCount(k));
    }
    if n < k {
        return Err(DecodeError::TooFewTrials {
            trials: n,
            folds: k,
        });
    }
    Ok(())
}

fn folds_from_assignment(assignment: &[usize], k: usize) -> Vec<Fold> {
    (0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..assignment.len()).partition(|&i| assignment[i] == fold);
            Fold { train, test }
        })
        .collect()
}
