use serde::Serialize;

use crate::outcome::{AccessOutcome, RunObservation, RunStatistics};

/// The first access where the two simulators disagree.
///
/// A side is `None` when its sequence ended before this index
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct Divergence {
    pub index: usize,
    pub reference: Option<AccessOutcome>,
    pub candidate: Option<AccessOutcome>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub first_divergence: Option<Divergence>,
    pub stats_match: bool,
    pub outcome_sequence_match: bool,
}

impl ComparisonResult {
    pub fn first_divergence_index(&self) -> Option<usize> {
        self.first_divergence.map(|d| d.index)
    }

    pub fn passed(&self) -> bool {
        self.outcome_sequence_match && self.stats_match && self.first_divergence.is_none()
    }
}

/// Compares outcome sequences element by element, stopping at the first difference, and the
/// statistics as a whole
pub fn compare(
    reference: &[AccessOutcome],
    candidate: &[AccessOutcome],
    reference_stats: &RunStatistics,
    candidate_stats: &RunStatistics,
) -> ComparisonResult {
    let first_divergence = (0..reference.len().max(candidate.len()))
        .map(|index| Divergence {
            index,
            reference: reference.get(index).copied(),
            candidate: candidate.get(index).copied(),
        })
        .find(|d| d.reference != d.candidate);
    ComparisonResult {
        outcome_sequence_match: first_divergence.is_none(),
        first_divergence,
        stats_match: reference_stats == candidate_stats,
    }
}

pub fn compare_observations(reference: &RunObservation, candidate: &RunObservation) -> ComparisonResult {
    compare(&reference.outcomes, &candidate.outcomes, &reference.stats, &candidate.stats)
}
