use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::candidate::{replay_against, CandidateSource, ReplayOptions};
use crate::compare::{compare_observations, ComparisonResult};
use crate::config::SweepCase;
use crate::error::VerifyError;
use crate::outcome::RunStatistics;
use crate::reference::Reference;
use crate::trace::read_trace;
use crate::util::trace_path;

/// How a single case ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict")]
pub enum Verdict {
    Pass,
    /// Both simulators ran, but disagreed
    Fail {
        comparison: ComparisonResult,
        reference: RunStatistics,
        candidate: RunStatistics,
    },
    /// The case couldn't be run to completion
    Error { kind: String, reason: String },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl From<VerifyError> for Verdict {
    fn from(e: VerifyError) -> Self {
        Verdict::Error {
            kind: e.kind().to_string(),
            reason: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub case: SweepCase,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub elapsed_secs: f64,
}

/// The verdicts of a sweep, in case order
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub cases: Vec<CaseReport>,
    pub passed: bool,
}

/// Runs every case against a reference and a candidate, one after the other.
///
/// Cases are independent: an error or a failure is recorded and the sweep moves on
pub struct Sweep<R, C> {
    reference: R,
    candidate: C,
    trace_dir: PathBuf,
    options: ReplayOptions,
}

impl<R: Reference, C: CandidateSource> Sweep<R, C> {
    pub fn new(reference: R, candidate: C, trace_dir: impl Into<PathBuf>, options: ReplayOptions) -> Self {
        Self {
            reference,
            candidate,
            trace_dir: trace_dir.into(),
            options,
        }
    }

    pub fn into_parts(self) -> (R, C) {
        (self.reference, self.candidate)
    }

    pub fn run(&mut self, cases: &[SweepCase]) -> SweepReport {
        let cases: Vec<CaseReport> = cases.iter().enumerate().map(|(i, case)| self.run_case(i, case)).collect();
        let passed = cases.iter().all(|c| c.verdict.passed());
        SweepReport { cases, passed }
    }

    pub fn run_case(&mut self, number: usize, case: &SweepCase) -> CaseReport {
        info!(
            "[{number}] s={} E={} b={} {}",
            case.index_bits, case.associativity, case.offset_bits, case.trace
        );
        let start = Instant::now();
        let verdict = self.check(case).unwrap_or_else(Verdict::from);
        let elapsed_secs = start.elapsed().as_secs_f64();
        match &verdict {
            Verdict::Pass => info!("[{number}] Pass"),
            Verdict::Fail { comparison, .. } => warn!(
                "[{number}] Fail, first divergence at {:?}, stats match: {}",
                comparison.first_divergence_index(),
                comparison.stats_match
            ),
            Verdict::Error { reason, .. } => warn!("[{number}] Fail, {reason}"),
        }
        CaseReport {
            case: case.clone(),
            verdict,
            elapsed_secs,
        }
    }

    fn check(&mut self, case: &SweepCase) -> Result<Verdict, VerifyError> {
        let geometry = case.geometry()?;
        let path = trace_path(&self.trace_dir, case);
        // Parsed up front so a malformed trace never reaches either simulator
        let records = read_trace(&path)?;
        let expected = self.reference.observe(geometry, &path, &records)?;
        let observed = {
            let mut instance = self.candidate.instantiate(geometry)?;
            replay_against(&mut instance, geometry, &records, &expected.outcomes, self.options)?
        };
        let comparison = compare_observations(&expected, &observed);
        if comparison.passed() {
            return Ok(Verdict::Pass);
        }
        Ok(Verdict::Fail {
            comparison,
            reference: expected.stats,
            candidate: observed.stats,
        })
    }
}
