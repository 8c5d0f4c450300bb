use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::VerifyError;
use crate::hex::{HEX_NIBBLE, INVALID_NIBBLE};
use crate::io::{load_bytes, TraceBytes};

/// The kind of memory access a trace line describes
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum Operation {
    Load,
    Store,
}

impl Operation {
    pub fn code(self) -> char {
        match self {
            Operation::Load => 'L',
            Operation::Store => 'S',
        }
    }
}

/// A single access from a trace file
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct AccessRecord {
    pub operation: Operation,
    pub address: u64,
    pub size: u8,
}

impl Display for AccessRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:x},{}", self.operation.code(), self.address, self.size)
    }
}

/// A trace file which has been opened and checked to be text.
///
/// Records are produced lazily, and [`TraceFile::records`] can be called any number of times to
/// walk the file again from the start
pub struct TraceFile {
    path: PathBuf,
    bytes: TraceBytes,
}

impl TraceFile {
    /// Opens a trace file, failing if it can't be read or contains non-ASCII bytes
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VerifyError> {
        let path = path.as_ref().to_path_buf();
        let bytes = load_bytes(&path)?;
        if let Some(position) = bytes.iter().position(|b| !b.is_ascii()) {
            return Err(VerifyError::Encoding { path, position });
        }
        Ok(Self { path, bytes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a new pass over the records of the file
    pub fn records(&self) -> TraceRecords<'_> {
        TraceRecords::new(&self.bytes, &self.path)
    }

    /// Parses every record, stopping at the first malformed line
    pub fn read_all(&self) -> Result<Vec<AccessRecord>, VerifyError> {
        self.records().collect()
    }
}

/// Reads and parses a whole trace file up front
pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<AccessRecord>, VerifyError> {
    TraceFile::open(path)?.read_all()
}

/// Lazy iterator over the records in a trace buffer
pub struct TraceRecords<'a> {
    remaining: &'a [u8],
    path: &'a Path,
    line: usize,
}

impl<'a> TraceRecords<'a> {
    /// `path` is only used to label errors
    pub fn new(bytes: &'a [u8], path: &'a Path) -> Self {
        Self {
            remaining: bytes,
            path,
            line: 0,
        }
    }
}

impl<'a> Iterator for TraceRecords<'a> {
    type Item = Result<AccessRecord, VerifyError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.remaining.is_empty() {
            let (line, rest) = match self.remaining.iter().position(|b| *b == b'\n') {
                Some(end) => (&self.remaining[..end], &self.remaining[end + 1..]),
                None => (self.remaining, &self.remaining[self.remaining.len()..]),
            };
            self.remaining = rest;
            self.line += 1;
            let line = trim(line);
            if line.is_empty() {
                continue;
            }
            let result = parse_line(line).map_err(|reason| VerifyError::Format {
                path: self.path.to_path_buf(),
                line: self.line,
                reason,
            });
            if result.is_err() {
                // Nothing after a malformed line is reported
                self.remaining = &[];
            }
            return Some(result);
        }
        None
    }
}

fn trim(mut line: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = line {
        if !matches!(first, b' ' | b'\t') {
            break;
        }
        line = rest;
    }
    while let [rest @ .., last] = line {
        if !matches!(last, b' ' | b'\t' | b'\r') {
            break;
        }
        line = rest;
    }
    line
}

/// Parses one trimmed trace line of the form `<L|S> <hex>,<size>`
///
/// # Examples
///
/// ```
/// use cachecheck::trace::{parse_line, AccessRecord, Operation};
/// let record = parse_line(b"S 7ff000388,4").unwrap();
/// assert_eq!(record, AccessRecord { operation: Operation::Store, address: 0x7ff000388, size: 4 });
/// ```
pub fn parse_line(line: &[u8]) -> Result<AccessRecord, String> {
    let text = String::from_utf8_lossy(line);
    let mut tokens = line.split(|b| *b == b' ').filter(|t| !t.is_empty());
    let (op, access) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(op), Some(access), None) => (op, access),
        _ => return Err(format!("expected two tokens in \"{text}\"")),
    };
    let operation = match op {
        b"L" => Operation::Load,
        b"S" => Operation::Store,
        _ => return Err(format!("unknown operation \"{}\"", String::from_utf8_lossy(op))),
    };
    let comma = access
        .iter()
        .position(|b| *b == b',')
        .ok_or_else(|| format!("missing ',' between address and size in \"{text}\""))?;
    let address = parse_address(&access[..comma])
        .ok_or_else(|| format!("invalid hex address in \"{text}\""))?;
    let size = parse_size(&access[comma + 1..]).ok_or_else(|| format!("invalid access size in \"{text}\""))?;
    Ok(AccessRecord {
        operation,
        address,
        size,
    })
}

/// Parses a hexadecimal address of 1 to 16 digits, without a `0x` prefix
///
/// Each digit is decoded with the generated nibble table, which returns a marker for anything
/// which isn't a hex digit
///
/// # Examples
///
/// ```
/// use cachecheck::trace::parse_address;
/// assert_eq!(parse_address(b"7fF"), Some(0x7ff));
/// assert_eq!(parse_address(b"0x10"), None);
/// ```
pub fn parse_address(buf: &[u8]) -> Option<u64> {
    if buf.is_empty() || buf.len() > 16 {
        return None;
    }
    let mut res: u64 = 0;
    for b in buf {
        let nibble = HEX_NIBBLE[*b as usize];
        if nibble == INVALID_NIBBLE {
            return None;
        }
        res = res << 4 | nibble as u64;
    }
    debug_assert_eq!(
        {
            let addr_as_str = std::str::from_utf8(buf).unwrap();
            u64::from_str_radix(addr_as_str, 16).unwrap()
        },
        res
    );
    Some(res)
}

/// Parses a decimal access size, accepting only 1, 2, 4 and 8
pub fn parse_size(buf: &[u8]) -> Option<u8> {
    if buf.is_empty() || !buf.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let size: u64 = std::str::from_utf8(buf).ok()?.parse().ok()?;
    match size {
        1 | 2 | 4 | 8 => Some(size as u8),
        _ => None,
    }
}
