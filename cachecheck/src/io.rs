use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use crate::error::VerifyError;

/// The raw bytes of a trace file, either memory mapped or read into memory
pub enum TraceBytes {
    #[cfg(unix)]
    Mapped(memmap2::Mmap),
    Buffered(Vec<u8>),
}

impl Deref for TraceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            TraceBytes::Mapped(m) => m,
            TraceBytes::Buffered(b) => b,
        }
    }
}

pub fn load_bytes(path: &Path) -> Result<TraceBytes, VerifyError> {
    let file = File::open(path).map_err(|e| VerifyError::io(path, e))?;
    let len = file.metadata().map_err(|e| VerifyError::io(path, e))?.len();
    // Mapping a zero length file fails on some platforms
    if len == 0 {
        return Ok(TraceBytes::Buffered(Vec::new()));
    }
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::Read;
        let mut buf = Vec::with_capacity(len as usize);
        let mut file = file;
        file.read_to_end(&mut buf).map_err(|e| VerifyError::io(path, e))?;
        Ok(TraceBytes::Buffered(buf))
    }
    // Memory map the file on unix systems, traces are walked strictly front to back
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        // Safety: the harness never writes trace files, and they aren't expected to change mid run
        let m = unsafe { Mmap::map(&file) }.map_err(|e| VerifyError::io(path, e))?;
        m.advise(Advice::Sequential).map_err(|e| VerifyError::io(path, e))?;
        Ok(TraceBytes::Mapped(m))
    }
}
