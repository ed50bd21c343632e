use anyhow::Result;
use std::path::PathBuf;

use crate::coldsync::config::load_config;
use crate::coldsync::ledger::UploadLedger;
use crate::coldsync::lock::WatchLock;
use crate::coldsync::paths::resolve_paths;
use crate::coldsync::watcher::{ArchiveContext, ArchiveStatus, process_archive};
use crate::commands::{BUILD_ID, CommandReport, ensure_uploader_available};
use crate::uploader::Uploader;

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub archive: PathBuf,
    pub vault: Option<String>,
    pub force: bool,
}

pub fn run(opts: &UploadOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("upload");
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;

    if !opts.archive.is_file() {
        report.issue(format!("archive not found: {}", opts.archive.display()));
        return Ok(report);
    }
    let Some(name) = opts.archive.file_name().and_then(|s| s.to_str()) else {
        report.issue(format!(
            "archive path has no UTF-8 file name: {}",
            opts.archive.display()
        ));
        return Ok(report);
    };

    // Held until the report is returned, so a watcher cannot upload the same
    // archive from a ledger snapshot taken before this record lands.
    let _lock = match WatchLock::acquire(&paths.watch_lock(), BUILD_ID) {
        Ok(lock) => lock,
        Err(err) => {
            report.issue(format!("{err:#}; stop it with `coldsync stop` first"));
            return Ok(report);
        }
    };

    let mut ledger = UploadLedger::load(&paths.ledger_file())?;
    if ledger.contains(name) && !opts.force {
        report.issue(format!(
            "{name} is already in the upload ledger {}; pass --force to upload it again",
            ledger.path().display()
        ));
        return Ok(report);
    }

    let Some(uploader) = ensure_uploader_available(&cfg.uploader, &mut report) else {
        return Ok(report);
    };
    report.detail(format!("uploader={}", uploader.describe()));

    let mut ctx = ArchiveContext {
        uploader: &uploader,
        ledger: &mut ledger,
        paths: &paths,
        done_prefix: &cfg.watcher.done_prefix,
        vaults: &cfg.vaults,
        vault_override: opts.vault.as_deref(),
    };
    let event = process_archive(&mut ctx, &opts.archive)?;
    match event.status {
        ArchiveStatus::UploadFailed | ArchiveStatus::Rejected => {
            report.issue(event.console_line())
        }
        _ => report.detail(event.console_line()),
    }

    Ok(report)
}
