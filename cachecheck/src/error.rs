use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

/// Everything that can stop a single verification case.
///
/// A behavioural mismatch between the two simulators is not an error, it is reported through
/// [`crate::compare::ComparisonResult`] and ends up as a failed verdict instead.
#[derive(Debug)]
pub enum VerifyError {
    /// A file could not be opened, mapped, or read
    Io { path: PathBuf, source: io::Error },
    /// A trace file contains bytes which are not ASCII text
    Encoding { path: PathBuf, position: usize },
    /// A trace line does not follow `<L|S> <hex>,<size>`
    Format { path: PathBuf, line: usize, reason: String },
    /// The harness configuration or a geometry is invalid
    Config(String),
    /// The candidate module failed to compile
    Build(String),
    /// The candidate module could not be loaded, or a required symbol is missing
    Load(String),
    /// The loaded candidate exposed state of an unexpected shape
    Runtime(String),
    /// The reference simulator failed, timed out, or produced unusable output
    Process(String),
}

impl VerifyError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VerifyError::Io { path: path.into(), source }
    }

    /// Short name of the error class, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::Io { .. } => "io",
            VerifyError::Encoding { .. } => "encoding",
            VerifyError::Format { .. } => "format",
            VerifyError::Config(_) => "config",
            VerifyError::Build(_) => "build",
            VerifyError::Load(_) => "load",
            VerifyError::Runtime(_) => "runtime",
            VerifyError::Process(_) => "process",
        }
    }
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::Io { path, source } => write!(f, "Couldn't read {}: {source}", path.display()),
            VerifyError::Encoding { path, position } => {
                write!(f, "{} is not a text file, non-ASCII byte at offset {position}", path.display())
            }
            VerifyError::Format { path, line, reason } => {
                write!(f, "Malformed trace {} at line {line}: {reason}", path.display())
            }
            VerifyError::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            VerifyError::Build(msg) => write!(f, "Candidate build failed: {msg}"),
            VerifyError::Load(msg) => write!(f, "Candidate load failed: {msg}"),
            VerifyError::Runtime(msg) => write!(f, "Candidate state error: {msg}"),
            VerifyError::Process(msg) => write!(f, "Reference simulator failed: {msg}"),
        }
    }
}

impl std::error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VerifyError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
