use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::coldsync::lock::{live_holder, read_holder};
use crate::coldsync::paths::resolve_paths;
use crate::commands::CommandReport;

const STOP_TIMEOUT: Duration = Duration::from_secs(8);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn cleanup_lock_file(lock_path: &Path, report: &mut CommandReport) {
    match fs::remove_file(lock_path) {
        Ok(()) => report.detail(format!("removed stale watcher lock {}", lock_path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => report.detail(format!(
            "failed to remove watcher lock {}: {}",
            lock_path.display(),
            err
        )),
    }
}

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("stop");
    let paths = resolve_paths()?;
    let lock_path = paths.watch_lock();
    report.detail(format!("watch_lock={}", lock_path.display()));

    let holder = match read_holder(&lock_path) {
        Ok(Some(holder)) => holder,
        Ok(None) => {
            report.detail("watcher already stopped (lock file not found)");
            return Ok(report);
        }
        Err(err) => {
            report.issue(format!("{err:#}"));
            return Ok(report);
        }
    };
    report.detail(format!("watcher_pid={}", holder.pid));

    if live_holder(&lock_path)?.is_none() {
        report.detail(format!("watcher pid {} is not running", holder.pid));
        cleanup_lock_file(&lock_path, &mut report);
        return Ok(report);
    }

    let request = paths.stop_request();
    if let Some(parent) = request.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&request, format!("requested_by={}\n", std::process::id()))
        .with_context(|| format!("failed to write {}", request.display()))?;
    report.detail(format!("stop_request={}", request.display()));

    let deadline = Instant::now() + STOP_TIMEOUT;
    while Instant::now() < deadline {
        if live_holder(&lock_path)?.is_none() {
            report.detail(format!("stopped watcher pid={}", holder.pid));
            return Ok(report);
        }
        thread::sleep(STOP_POLL_INTERVAL);
    }

    report.detail(format!(
        "watcher pid {} is still busy after {}s; it will stop once the current upload finishes",
        holder.pid,
        STOP_TIMEOUT.as_secs()
    ));
    Ok(report)
}
