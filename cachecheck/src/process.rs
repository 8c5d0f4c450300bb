use std::fmt::{Display, Formatter};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output of a subprocess which ran to completion
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

#[derive(Debug)]
pub enum ProcessFailure {
    Spawn(io::Error),
    Wait(io::Error),
    Read(io::Error),
    TimedOut(Duration),
}

impl Display for ProcessFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessFailure::Spawn(e) => write!(f, "couldn't start process: {e}"),
            ProcessFailure::Wait(e) => write!(f, "couldn't wait for process: {e}"),
            ProcessFailure::Read(e) => write!(f, "couldn't read process output: {e}"),
            ProcessFailure::TimedOut(t) => write!(f, "timed out after {:.1}s", t.as_secs_f64()),
        }
    }
}

/// Owns a running child, and kills and reaps it if dropped before it has been waited on.
///
/// On unix the child leads its own process group and the whole group is killed, so helpers it
/// spawned can't hold the output pipes open past the timeout
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    #[cfg(unix)]
    fn kill(&mut self) {
        // The child is not reaped yet, so its pid is still the id of its process group
        match libc::pid_t::try_from(self.child.id()) {
            // Safety: kill has no memory effects
            Ok(pgid) => unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            },
            Err(_) => {
                let _ = self.child.kill();
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&mut self) {
        let _ = self.child.kill();
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        self.reaped = status.is_some();
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill();
            let _ = self.child.wait();
        }
    }
}

pub(crate) fn drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            source.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

/// Waits for a reader started by [`drain`]
pub(crate) fn collect(reader: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>, ProcessFailure> {
    reader
        .join()
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "output reader panicked")))
        .map_err(ProcessFailure::Read)
}

/// Runs a command to completion with captured output, killing it once `timeout` has elapsed.
///
/// The child is terminated on every path out of this function, including the timeout and any
/// error while waiting
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<CapturedOutput, ProcessFailure> {
    debug!("Running {:?}", cmd);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ProcessFailure::Spawn)?;
    let mut guard = ChildGuard { child, reaped: false };
    // Pipes are drained on their own threads so a chatty child can't block on a full pipe
    let stdout = drain(guard.child.stdout.take());
    let stderr = drain(guard.child.stderr.take());
    let start = Instant::now();
    let status = loop {
        match guard.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) if start.elapsed() >= timeout => break Err(ProcessFailure::TimedOut(timeout)),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => break Err(ProcessFailure::Wait(e)),
        }
    };
    // Kill before joining, the readers only finish once the child's pipes close
    drop(guard);
    let stdout = collect(stdout);
    let stderr = collect(stderr);
    Ok(CapturedOutput {
        status: status?,
        stdout: stdout?,
        stderr: stderr?,
    })
}
