use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::address::Geometry;
use crate::error::VerifyError;
use crate::outcome::{AccessOutcome, RunObservation, RunStatistics};
use crate::process::run_with_timeout;
use crate::trace::AccessRecord;

lazy_static! {
    static ref STAT_VALUE: Regex = Regex::new(r"[0-9]+").unwrap();
}

/// The golden side of a differential run
pub trait Reference {
    /// Produces the expected behaviour of the cache described by `geometry` on a trace.
    ///
    /// `records` are the already parsed contents of `trace_path`
    fn observe(
        &mut self,
        geometry: Geometry,
        trace_path: &Path,
        records: &[AccessRecord],
    ) -> Result<RunObservation, VerifyError>;
}

/// Drives a reference simulator executable with the `-v -s -E -b -t` interface
pub struct ReferenceSimulator {
    executable: PathBuf,
    timeout: Duration,
}

impl ReferenceSimulator {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self, geometry: Geometry, trace_path: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-v")
            .arg("-s")
            .arg(geometry.index_bits().to_string())
            .arg("-E")
            .arg(geometry.associativity().to_string())
            .arg("-b")
            .arg(geometry.offset_bits().to_string())
            .arg("-t")
            .arg(trace_path);
        cmd
    }
}

impl Reference for ReferenceSimulator {
    fn observe(
        &mut self,
        geometry: Geometry,
        trace_path: &Path,
        records: &[AccessRecord],
    ) -> Result<RunObservation, VerifyError> {
        let output = run_with_timeout(&mut self.command(geometry, trace_path), self.timeout)
            .map_err(|e| VerifyError::Process(format!("{}: {e}", self.executable.display())))?;
        if !output.status.success() {
            return Err(VerifyError::Process(format!(
                "{} exited with {}: {}",
                self.executable.display(),
                output.status,
                output.stderr_lossy()
            )));
        }
        let stdout = std::str::from_utf8(&output.stdout)
            .ok()
            .filter(|s| s.is_ascii())
            .ok_or_else(|| VerifyError::Process("output is not ASCII text".to_string()))?;
        let observation = parse_verbose_output(stdout)?;
        if observation.outcomes.len() != records.len() {
            return Err(VerifyError::Process(format!(
                "reported {} accesses for a trace of {}",
                observation.outcomes.len(),
                records.len()
            )));
        }
        debug!("Reference reported {}", observation.stats);
        Ok(observation)
    }
}

/// Parses the verbose output of a reference run.
///
/// Each access line ends in `hit`, `miss`, or `miss eviction`, and the summary line starts with
/// `hits:` and holds the five counters in order
///
/// # Examples
///
/// ```
/// use cachecheck::reference::parse_verbose_output;
/// use cachecheck::outcome::AccessOutcome;
/// let out = "L 10,1 miss \nS 18,1 hit\nL 50,1 miss eviction\nhits:1 misses:2 evictions:1 dirty_bytes_in_cache:16 dirty_bytes_evicted:0\n";
/// let observation = parse_verbose_output(out).unwrap();
/// assert_eq!(observation.outcomes, vec![AccessOutcome::Miss, AccessOutcome::Hit, AccessOutcome::MissWithEviction]);
/// assert_eq!(observation.stats.dirty_bytes_resident, 16);
/// ```
pub fn parse_verbose_output(stdout: &str) -> Result<RunObservation, VerifyError> {
    let mut outcomes = Vec::new();
    let mut stats = None;
    for line in stdout.lines().map(str::trim_end) {
        if line.starts_with("hits:") {
            stats = Some(parse_summary(line)?);
        } else if let Some(outcome) = outcome_suffix(line) {
            outcomes.push(outcome);
        }
    }
    let stats = stats.ok_or_else(|| VerifyError::Process("no summary line starting with \"hits:\"".to_string()))?;
    Ok(RunObservation { outcomes, stats })
}

fn outcome_suffix(line: &str) -> Option<AccessOutcome> {
    [AccessOutcome::MissWithEviction, AccessOutcome::Hit, AccessOutcome::Miss]
        .into_iter()
        .find(|outcome| line.ends_with(outcome.label()))
}

fn parse_summary(line: &str) -> Result<RunStatistics, VerifyError> {
    let values = STAT_VALUE
        .find_iter(line)
        .map(|m| m.as_str().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| VerifyError::Process(format!("bad counter in \"{line}\": {e}")))?;
    let values: [u64; 5] = values
        .try_into()
        .map_err(|v: Vec<u64>| VerifyError::Process(format!("expected 5 counters in \"{line}\", found {}", v.len())))?;
    Ok(RunStatistics::from_array(values))
}
