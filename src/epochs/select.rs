// Category-based trial selection
// Filters trials by metadata value and optionally balances label classes

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::epochs::types::{TrialCollection, TrialMetadata};

/// Selects trials whose metadata `field` equals `value`
/// (e.g. field "phonation" with value "v" for voiced phonemes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub field: String,
    pub value: String,
}

impl CategoryFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        CategoryFilter {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, metadata: &TrialMetadata) -> bool {
        metadata.get(&self.field).is_some_and(|v| *v == self.value)
    }
}

/// How the per-filter subsets are combined into one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Every trial matching at least one filter, once, in recording order
    #[default]
    Union,

    /// Subsets stacked filter by filter; a trial matching several filters
    /// appears once per matching filter
    Concatenate,
}

/// Indices of the trials matching a filter
pub fn matching_trials(collection: &TrialCollection, filter: &CategoryFilter) -> Vec<usize> {
    collection
        .metadata()
        .iter()
        .enumerate()
        .filter(|(_, m)| filter.matches(m))
        .map(|(i, _)| i)
        .collect()
}

/// Trial indices selected by a set of filters
pub fn selected_indices(
    collection: &TrialCollection,
    filters: &[CategoryFilter],
    mode: SelectionMode,
) -> Vec<usize> {
    match mode {
        SelectionMode::Union => collection
            .metadata()
            .iter()
            .enumerate()
            .filter(|(_, m)| filters.iter().any(|f| f.matches(m)))
            .map(|(i, _)| i)
            .collect(),
        SelectionMode::Concatenate => filters
            .iter()
            .flat_map(|f| matching_trials(collection, f))
            .collect(),
    }
}

/// Combine the trials of every category filter into one collection
pub fn select_trials(
    collection: &TrialCollection,
    filters: &[CategoryFilter],
    mode: SelectionMode,
) -> TrialCollection {
    let indices = selected_indices(collection, filters, mode);
    collection.select(&indices)
}

/// Indices of a class-balanced subset: the majority class is randomly
/// down-sampled to the size of the minority class
///
/// Returned indices are sorted. When one class is absent every index is
/// returned unchanged; the decoder reports that case.
pub fn balance_classes<R: Rng + ?Sized>(labels: &[bool], rng: &mut R) -> Vec<usize> {
    let (mut positives, mut negatives): (Vec<usize>, Vec<usize>) =
        (0..labels.len()).partition(|&i| labels[i]);

    let minority = positives.len().min(negatives.len());
    if minority == 0 {
        return (0..labels.len()).collect();
    }

    positives.shuffle(rng);
    negatives.shuffle(rng);
    positives.truncate(minority);
    negatives.truncate(minority);

    let mut indices: Vec<usize> = positives.into_iter().chain(negatives).collect();
    indices.sort_unstable();
    indices
}
