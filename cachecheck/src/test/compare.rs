use crate::compare::{compare, compare_observations, Divergence};
use crate::outcome::AccessOutcome::{Hit, Miss, MissWithEviction};
use crate::outcome::{RunObservation, RunStatistics};

fn stats(values: [u64; 5]) -> RunStatistics {
    RunStatistics::from_array(values)
}

#[test]
fn identical_runs_pass() {
    let run = RunObservation {
        outcomes: vec![Miss, Hit, MissWithEviction],
        stats: stats([1, 2, 1, 0, 0]),
    };
    let result = compare_observations(&run, &run.clone());
    assert!(result.passed());
    assert!(result.stats_match && result.outcome_sequence_match);
    assert_eq!(result.first_divergence_index(), None);
}

#[test]
fn reports_only_the_first_divergence() {
    let reference = [Miss, Hit, Hit, Miss];
    let candidate = [Miss, Miss, Hit, Hit];
    let s = stats([2, 2, 0, 0, 0]);
    let result = compare(&reference, &candidate, &s, &s);
    assert!(!result.passed());
    assert!(!result.outcome_sequence_match);
    assert!(result.stats_match);
    assert_eq!(
        result.first_divergence,
        Some(Divergence {
            index: 1,
            reference: Some(Hit),
            candidate: Some(Miss),
        })
    );
}

#[test]
fn divergence_at_every_position_is_found() {
    let reference = vec![Miss; 6];
    for k in 0..reference.len() {
        let mut candidate = reference.clone();
        candidate[k] = MissWithEviction;
        let result = compare(&reference, &candidate, &RunStatistics::default(), &RunStatistics::default());
        assert_eq!(result.first_divergence_index(), Some(k));
    }
}

#[test]
fn stats_mismatch_alone_fails() {
    let outcomes = [Miss, Miss];
    let result = compare(&outcomes, &outcomes, &stats([0, 2, 0, 0, 0]), &stats([0, 2, 0, 4, 0]));
    assert!(result.outcome_sequence_match);
    assert!(!result.stats_match);
    assert!(!result.passed());
}

#[test]
fn shorter_candidate_diverges_where_it_ends() {
    let result = compare(&[Miss, Hit], &[Miss], &RunStatistics::default(), &RunStatistics::default());
    assert_eq!(
        result.first_divergence,
        Some(Divergence {
            index: 1,
            reference: Some(Hit),
            candidate: None,
        })
    );
}
