use anyhow::Result;

use crate::coldsync::ledger::UploadLedger;
use crate::coldsync::lock::WatchLock;
use crate::coldsync::paths::resolve_paths;
use crate::commands::{BUILD_ID, CommandReport};

pub fn list() -> Result<CommandReport> {
    let mut report = CommandReport::new("ledger-list");
    let paths = resolve_paths()?;
    let ledger = UploadLedger::load(&paths.ledger_file())?;
    report.detail(format!("ledger={}", ledger.path().display()));

    if ledger.is_empty() {
        report.detail("ledger is empty");
        return Ok(report);
    }

    let records = ledger.records()?;
    for record in &records {
        report.detail(format!(
            "{} vault={} size_bytes={} uploaded_at_epoch_secs={}",
            record.archive, record.vault, record.size_bytes, record.uploaded_at_epoch_secs
        ));
    }
    report.detail(format!("records={} archives={}", records.len(), ledger.len()));
    Ok(report)
}

/// Remove an archive so the watcher will upload it again.
pub fn forget(archive: &str) -> Result<CommandReport> {
    let mut report = CommandReport::new("ledger-forget");
    let paths = resolve_paths()?;
    let _lock = match WatchLock::acquire(&paths.watch_lock(), BUILD_ID) {
        Ok(lock) => lock,
        Err(err) => {
            report.issue(format!("{err:#}; stop it with `coldsync stop` first"));
            return Ok(report);
        }
    };
    let mut ledger = UploadLedger::load(&paths.ledger_file())?;

    let removed = ledger.forget(archive)?;
    if removed == 0 {
        report.issue(format!(
            "{archive} is not in the upload ledger {}",
            ledger.path().display()
        ));
    } else {
        report.detail(format!("forgot {archive} (removed {removed} records)"));
    }
    Ok(report)
}
