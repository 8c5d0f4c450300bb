use std::io::{self, Read};

use crate::process::{collect, drain, ProcessFailure};

/// Hands out a few bytes, then fails
struct BrokenPipe {
    sent: bool,
}

impl Read for BrokenPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.sent {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe went away"));
        }
        self.sent = true;
        let n = buf.len().min(4);
        buf[..n].copy_from_slice(&b"hits"[..n]);
        Ok(n)
    }
}

#[test]
fn read_error_is_not_a_short_output() {
    match collect(drain(Some(BrokenPipe { sent: false }))) {
        Err(ProcessFailure::Read(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        Err(e) => panic!("expected a read failure, got {e}"),
        Ok(out) => panic!("read error was dropped, got {} bytes", out.len()),
    }
}

#[test]
fn missing_pipe_reads_as_empty() {
    let out = collect(drain(None::<BrokenPipe>)).unwrap();
    assert!(out.is_empty());
}

#[cfg(unix)]
#[test]
fn captures_both_streams() {
    use std::process::Command;
    use std::time::Duration;

    use crate::process::run_with_timeout;

    if !std::path::Path::new("/bin/sh").is_file() {
        println!("No /bin/sh, skipping");
        return;
    }
    let mut cmd = Command::new("/bin/sh");
    cmd.args(["-c", "echo out; echo err >&2; exit 2"]);
    let output = run_with_timeout(&mut cmd, Duration::from_secs(10)).unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(output.stdout, b"out\n");
    assert_eq!(output.stderr_lossy(), "err");
}
