// Classification metrics
// Threshold-free ROC-AUC via the Mann-Whitney rank statistic

use std::cmp::Ordering;

/// Area under the ROC curve of `scores` for the binary `labels`
///
/// Tied scores receive their average rank, so a constant scorer gives 0.5.
/// Returns `None` when the inputs differ in length or only one class is present.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    if scores.len() != labels.len() {
        return None;
    }

    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    // Sum of 1-based ranks of the positives, ties averaged
    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }

        let average_rank = (start + 1 + end) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| labels[i]).count();
        positive_rank_sum += average_rank * tied_positives as f64;

        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    let u = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some((u / (n_pos * n_neg)).clamp(0.0, 1.0))
}
