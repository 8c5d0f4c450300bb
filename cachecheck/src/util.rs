use std::path::{Path, PathBuf};

use crate::config::SweepCase;

/// The sweep run when no cases are configured, covering direct mapped, set associative, and a
/// large highly associative cache
pub fn default_cases() -> Vec<SweepCase> {
    vec![
        SweepCase::new(2, 1, 2, "wide.trace"),
        SweepCase::new(3, 2, 2, "load.trace"),
        SweepCase::new(1, 1, 1, "yi2.trace"),
        SweepCase::new(4, 2, 4, "yi.trace"),
        SweepCase::new(2, 1, 4, "dave.trace"),
        SweepCase::new(2, 1, 3, "trans.trace"),
        SweepCase::new(2, 2, 3, "trans.trace"),
        SweepCase::new(14, 1024, 3, "trans.trace"),
        SweepCase::new(5, 1, 5, "trans.trace"),
        SweepCase::new(5, 1, 5, "long.trace"),
    ]
}

/// Resolves a case's trace file against the trace directory
pub fn trace_path(trace_dir: &Path, case: &SweepCase) -> PathBuf {
    trace_dir.join(&case.trace)
}

/// Finds an executable on `PATH`, or checks it directly if it already contains a separator
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|full_path| full_path.is_file())
    })
}
