//! # CacheCheck
//!
//! CacheCheck is a library for differential testing of cache simulators
//!
//! A candidate simulator, supplied as C source with its geometry set by build time constants, is
//! compiled and loaded once per configuration. The same memory trace is replayed against it and
//! against a reference simulator executable, and the per-access outcomes and final counters of
//! the two are compared
//!
//! Correctness is judged only by those comparisons, the address codec is purely diagnostic

/// Splitting addresses into tag, index, and offset fields, and the cache geometry
pub mod address;

/// Building, loading, and replaying traces against the candidate simulator
pub mod candidate;

/// Comparing what the two simulators observed
pub mod compare;

/// The JSON harness configuration
pub mod config;

pub mod error;

/// Access outcomes and run statistics shared by both simulators
pub mod outcome;

/// Running subprocesses with a timeout
pub mod process;

/// Running the reference simulator and parsing its output
pub mod reference;

/// Running a list of configurations and collecting verdicts
pub mod sweep;

/// Trace file parsing
pub mod trace;

mod io;
// Generated from the build.rs, private
mod hex {
    include!(concat!(env!("OUT_DIR"), "/hex.rs"));
}
#[cfg(test)]
mod test;

/// Contains utilities for locating traces and tools
pub mod util;
