use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before UNIX_EPOCH")?
        .as_secs())
}

/// Keep the last `max_chars` characters of `input`, dropping control
/// characters and prefixing `…` when cut.
pub fn tail_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    let clean = clean.trim();
    let count = clean.chars().count();
    if count > max_chars {
        let mut s = String::from("…");
        s.extend(clean.chars().skip(count - max_chars));
        s
    } else {
        clean.to_string()
    }
}

pub fn pid_alive(pid: u32) -> bool {
    if cfg!(windows) {
        // The fs2 lock on the watch lock file is the authority on Windows.
        true
    } else {
        let Ok(status) = Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stderr(Stdio::null())
            .status()
        else {
            return false;
        };
        status.success()
    }
}

/// Read a child pipe to the end on its own thread so the child never blocks
/// on a full pipe while we poll for exit.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join_output(handle: thread::JoinHandle<Vec<u8>>) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("output reader thread panicked"))
}

pub fn run_command_with_optional_timeout(
    cmd: &mut Command,
    timeout_secs: Option<u64>,
) -> Result<Output> {
    cmd.stdin(Stdio::null());
    let Some(timeout_secs) = timeout_secs else {
        return Ok(cmd.output()?);
    };
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Output {
                status,
                stdout: join_output(stdout)?,
                stderr: join_output(stderr)?,
            });
        }
        if started.elapsed() >= Duration::from_secs(timeout_secs) {
            let _ = child.kill();
            let _ = child.wait();
            // Readers finish once every holder of the pipes exits; a
            // grandchild may keep them open, so they are not joined here.
            anyhow::bail!("command timed out after {}s", timeout_secs);
        }
        thread::sleep(Duration::from_millis(50));
    }
}
