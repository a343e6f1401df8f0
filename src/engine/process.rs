use std::ffi::OsStr;
use std::io::{Read, Write};
use std::process::{Command, Output, Stdio};
use std::thread::JoinHandle;
use tracing::debug;

/// Runs `exe args...`, writes `stdin` to the child, and collects everything it prints.
///
/// stdout and stderr are drained on their own threads while stdin is being
/// written, so a child that streams a large result before it has finished
/// reading its input can't deadlock on a full pipe.
pub fn run_piped<I, S>(exe: &str, args: I, stdin: Option<&[u8]>) -> std::io::Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(exe);
    cmd.args(args);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    debug!("spawn {:?}", cmd);

    let mut child = cmd.spawn()?;

    let stdout_thread = drain(child.stdout.take());
    let stderr_thread = drain(child.stderr.take());

    if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // A child that exits early closes its end; the exit status tells the real story.
        let _ = pipe.write_all(bytes);
        let _ = pipe.flush();
    }

    let status = child.wait()?;
    let stdout = join(stdout_thread, "stdout")?;
    let stderr = join(stderr_thread, "stderr")?;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            r.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join(handle: JoinHandle<std::io::Result<Vec<u8>>>, name: &str) -> std::io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| std::io::Error::other(format!("{name} reader thread panicked")))?
}

/// Last non-empty stderr line, for error messages.
pub fn stderr_tail(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}
