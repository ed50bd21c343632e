use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::coldsync::cancel::StopRequest;
use crate::coldsync::config::load_config;
use crate::coldsync::ledger::UploadLedger;
use crate::coldsync::lock::WatchLock;
use crate::coldsync::paths::resolve_paths;
use crate::coldsync::watcher::{WatchCycleOutcome, WatchScheduler, WatchSettings};
use crate::commands::{BUILD_ID, CommandReport, ensure_uploader_available};
use crate::uploader::Uploader;

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub once: bool,
    pub daemon: bool,
    pub dir: Option<PathBuf>,
    pub interval_secs: Option<u64>,
    pub vault: Option<String>,
    pub max_cycles: Option<u64>,
    pub json: bool,
}

fn print_cycle(outcome: &WatchCycleOutcome, json: bool) {
    if json {
        match serde_json::to_string(outcome) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to render cycle {}: {err}", outcome.cycle),
        }
        return;
    }
    for line in outcome.console_lines() {
        println!("{line}");
    }
}

pub fn run(opts: &WatchOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("watch");

    if opts.once && opts.daemon {
        report.issue("invalid flags: use only one of --once or --daemon");
        return Ok(report);
    }
    if opts.interval_secs == Some(0) {
        report.issue("invalid --interval-secs: must be >= 1");
        return Ok(report);
    }
    if opts.max_cycles == Some(0) {
        report.issue("invalid --max-cycles: must be >= 1");
        return Ok(report);
    }

    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;

    let dir = match opts.dir.clone().or_else(|| cfg.watcher.dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };
    if !dir.is_dir() {
        report.issue(format!("watch directory not found: {}", dir.display()));
        return Ok(report);
    }

    let Some(uploader) = ensure_uploader_available(&cfg.uploader, &mut report) else {
        return Ok(report);
    };

    let mut settings = WatchSettings::from_config(&cfg, dir);
    if let Some(secs) = opts.interval_secs {
        settings.interval = Duration::from_secs(secs);
    }
    settings.vault_override = opts.vault.clone();
    settings.max_cycles = if opts.once { Some(1) } else { opts.max_cycles };

    let lock = match WatchLock::acquire(&paths.watch_lock(), BUILD_ID) {
        Ok(lock) => lock,
        Err(err) => {
            report.issue(format!("{err:#}"));
            return Ok(report);
        }
    };

    let stop_request = StopRequest::new(paths.stop_request());
    if stop_request.is_requested() {
        fs::remove_file(stop_request.path()).with_context(|| {
            format!("failed to clear stale {}", stop_request.path().display())
        })?;
        report.detail(format!(
            "cleared stale stop request {}",
            stop_request.path().display()
        ));
    }

    let ledger = UploadLedger::load(&paths.ledger_file())?;
    report.detail(format!("watch_dir={}", settings.dir.display()));
    report.detail(format!("ledger={} entries={}", ledger.path().display(), ledger.len()));
    report.detail(format!("uploader={}", uploader.describe()));
    report.detail(format!("lock={}", lock.path().display()));

    let mut scheduler =
        WatchScheduler::new(settings, &uploader, ledger, &paths).with_stop_request(stop_request);

    if opts.once {
        let mut lines = Vec::new();
        let summary = scheduler.run(|outcome| lines.extend(outcome.console_lines()))?;
        for line in lines {
            report.detail(line);
        }
        if summary.failed > 0 {
            report.issue(format!("{} archives could not be uploaded", summary.failed));
        }
        return Ok(report);
    }

    if !opts.json {
        for line in &report.details {
            println!("{line}");
        }
        report.details.clear();
    }
    let summary = scheduler.run(|outcome| print_cycle(outcome, opts.json))?;
    report.detail(format!(
        "watcher stopped after {} cycles: uploaded={} failed={} cancelled={} ledger_entries={}",
        summary.cycles,
        summary.uploaded,
        summary.failed,
        summary.cancelled,
        scheduler.ledger().len()
    ));
    Ok(report)
}
