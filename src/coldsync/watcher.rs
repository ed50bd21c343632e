use crate::coldsync::audit;
use crate::coldsync::cancel::{CancellationToken, StopRequest};
use crate::coldsync::config::{ColdsyncConfig, VaultNames};
use crate::coldsync::ledger::{UploadLedger, UploadRecord};
use crate::coldsync::paths::ColdsyncPaths;
use crate::coldsync::util::now_epoch_secs;
use crate::coldsync::vault::decide_vault;
use crate::coldsync::warn;
use crate::error::WarnCode;
use crate::uploader::Uploader;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub dir: PathBuf,
    pub interval: Duration,
    pub done_prefix: String,
    pub archive_extension: String,
    pub partial_suffix: String,
    pub vaults: VaultNames,
    /// Send everything to this vault instead of routing by name.
    pub vault_override: Option<String>,
    pub max_cycles: Option<u64>,
}

impl WatchSettings {
    pub fn from_config(cfg: &ColdsyncConfig, dir: PathBuf) -> Self {
        Self {
            dir,
            interval: Duration::from_secs(cfg.watcher.poll_interval_secs),
            done_prefix: cfg.watcher.done_prefix.clone(),
            archive_extension: cfg.watcher.archive_extension.clone(),
            partial_suffix: cfg.watcher.partial_suffix.clone(),
            vaults: cfg.vaults.clone(),
            vault_override: None,
            max_cycles: None,
        }
    }

    fn is_archive_name(&self, name: &str) -> bool {
        name.len() > self.archive_extension.len() + 1
            && name
                .strip_suffix(self.archive_extension.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
            && !name.starts_with(&self.done_prefix)
    }

    fn partial_marker(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{}", self.partial_suffix))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStatus {
    Uploaded,
    UploadedNotRenamed,
    UploadedNotRecorded,
    UploadFailed,
    Rejected,
}

impl ArchiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::UploadedNotRenamed => "uploaded-not-renamed",
            Self::UploadedNotRecorded => "uploaded-not-recorded",
            Self::UploadFailed => "upload-failed",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_uploaded(self) -> bool {
        matches!(
            self,
            Self::Uploaded | Self::UploadedNotRenamed | Self::UploadedNotRecorded
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveEvent {
    pub archive: String,
    pub vault: Option<String>,
    pub status: ArchiveStatus,
    pub message: String,
}

impl ArchiveEvent {
    pub fn console_line(&self) -> String {
        let vault = self.vault.as_deref().unwrap_or("-");
        match self.status {
            ArchiveStatus::Uploaded => {
                format!("Uploaded {} to {vault}; {}", self.archive, self.message)
            }
            ArchiveStatus::UploadedNotRenamed | ArchiveStatus::UploadedNotRecorded => format!(
                "[WARN] Uploaded {} to {vault}, but {}",
                self.archive, self.message
            ),
            ArchiveStatus::UploadFailed => {
                format!("[ERROR] Upload failed for {}: {}", self.archive, self.message)
            }
            ArchiveStatus::Rejected => {
                format!("[ERROR] Skipping {}: {}", self.archive, self.message)
            }
        }
    }
}

/// Everything needed to push one archive through upload → ledger → rename.
pub struct ArchiveContext<'a, U: Uploader + ?Sized> {
    pub uploader: &'a U,
    pub ledger: &'a mut UploadLedger,
    pub paths: &'a ColdsyncPaths,
    pub done_prefix: &'a str,
    pub vaults: &'a VaultNames,
    pub vault_override: Option<&'a str>,
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("archive path has no UTF-8 file name: {}", path.display()))
}

pub fn done_path(archive: &Path, done_prefix: &str, name: &str) -> PathBuf {
    archive.with_file_name(format!("{done_prefix}{name}"))
}

fn rename_done(archive: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        anyhow::bail!("{} already exists", target.display());
    }
    fs::rename(archive, target).with_context(|| {
        format!(
            "failed to rename {} to {}",
            archive.display(),
            target.display()
        )
    })
}

/// Audit writes never interrupt an archive; a failed append becomes a warning.
fn note(paths: &ColdsyncPaths, phase: &str, status: &str, archive: &str, message: &str) {
    if let Err(err) = audit::append_event(paths, phase, status, message) {
        warn::emit(
            WarnCode::W006AuditWriteFailed,
            phase,
            archive,
            "",
            "audit-append-failed",
            &format!("{err:#}"),
        );
    }
}

fn failed_event(name: String, vault: String, err: &anyhow::Error) -> ArchiveEvent {
    ArchiveEvent {
        archive: name,
        vault: Some(vault),
        status: ArchiveStatus::UploadFailed,
        message: format!("{err:#}"),
    }
}

/// Upload one archive, record it, and mark it done. Upload failures and
/// naming problems come back as events; `Err` is only returned before the
/// uploader runs.
pub fn process_archive<U: Uploader + ?Sized>(
    ctx: &mut ArchiveContext<'_, U>,
    archive: &Path,
) -> Result<ArchiveEvent> {
    let name = file_name_of(archive)?;

    let vault = match ctx.vault_override {
        Some(vault) => vault.to_string(),
        None => match decide_vault(&name) {
            Ok(kind) => kind.vault_name(ctx.vaults).to_string(),
            Err(err) => {
                warn::emit(
                    WarnCode::W004NamingRejected,
                    "route",
                    &name,
                    "",
                    "naming",
                    &err.to_string(),
                );
                note(
                    ctx.paths,
                    "route",
                    "rejected",
                    &name,
                    &format!("archive={name} error={err}"),
                );
                return Ok(ArchiveEvent {
                    archive: name,
                    vault: None,
                    status: ArchiveStatus::Rejected,
                    message: err.to_string(),
                });
            }
        },
    };

    let size_bytes = match fs::metadata(archive) {
        Ok(meta) => meta.len(),
        Err(err) => {
            let err = anyhow::Error::new(err)
                .context(format!("failed to read metadata of {}", archive.display()));
            warn::emit(
                WarnCode::W001UploadFailed,
                "stat",
                &name,
                &vault,
                "metadata-unreadable",
                &format!("{err:#}"),
            );
            return Ok(failed_event(name, vault, &err));
        }
    };
    let started_at = now_epoch_secs()?;

    let receipt = match ctx.uploader.upload(archive, &vault) {
        Ok(receipt) => receipt,
        Err(err) => {
            warn::emit(
                WarnCode::W001UploadFailed,
                "upload",
                &name,
                &vault,
                "uploader-failed",
                &format!("{err:#}"),
            );
            note(
                ctx.paths,
                "upload",
                "failed",
                &name,
                &format!("archive={name} vault={vault} error={err:#}"),
            );
            return Ok(failed_event(name, vault, &err));
        }
    };

    // Nothing may fail between a successful upload and this append.
    let record = UploadRecord {
        archive: name.clone(),
        vault: vault.clone(),
        size_bytes,
        uploaded_at_epoch_secs: started_at,
        summary: receipt.summary,
    };
    let recorded = ctx.ledger.record(&record);
    if let Err(err) = &recorded {
        warn::emit(
            WarnCode::W003LedgerWriteFailed,
            "ledger",
            &name,
            &vault,
            "append-failed",
            &format!("{err:#}"),
        );
    }
    note(
        ctx.paths,
        "upload",
        "ok",
        &name,
        &format!("archive={name} vault={vault} size_bytes={size_bytes}"),
    );

    let target = done_path(archive, ctx.done_prefix, &name);
    let renamed = rename_done(archive, &target);
    if let Err(err) = &renamed {
        warn::emit(
            WarnCode::W002RenameFailed,
            "rename",
            &name,
            &vault,
            "rename-failed",
            &format!("{err:#}"),
        );
    }

    let (status, message) = match (recorded, renamed) {
        (Ok(()), Ok(())) => (
            ArchiveStatus::Uploaded,
            format!("marked as done ({})", target.display()),
        ),
        (Ok(()), Err(err)) => (
            ArchiveStatus::UploadedNotRenamed,
            format!("could not mark it done ({err:#}); the upload ledger still prevents a re-upload"),
        ),
        (Err(err), Ok(())) => (
            ArchiveStatus::UploadedNotRecorded,
            format!(
                "could not record it in the upload ledger ({err:#}); renamed to {}",
                target.display()
            ),
        ),
        (Err(ledger_err), Err(rename_err)) => (
            ArchiveStatus::UploadedNotRecorded,
            format!(
                "could not record it ({ledger_err:#}) nor rename it ({rename_err:#}); a restart will upload it again"
            ),
        ),
    };

    note(
        ctx.paths,
        "finish",
        if status == ArchiveStatus::Uploaded {
            "ok"
        } else {
            "degraded"
        },
        &name,
        &format!("archive={name} vault={vault} status={}", status.as_str()),
    );

    Ok(ArchiveEvent {
        archive: name,
        vault: Some(vault),
        status,
        message,
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryScan {
    /// Archives that look complete and are not in the ledger, sorted by name.
    pub pending: Vec<PathBuf>,
    pub candidates: usize,
    pub incomplete: Vec<String>,
    pub already_uploaded: Vec<String>,
}

pub fn scan_directory(settings: &WatchSettings, ledger: &UploadLedger) -> Result<DirectoryScan> {
    let entries = fs::read_dir(&settings.dir)
        .with_context(|| format!("failed to read {}", settings.dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if settings.is_archive_name(name) {
            names.push(name.to_string());
        }
    }
    names.sort();

    let mut out = DirectoryScan {
        candidates: names.len(),
        ..DirectoryScan::default()
    };
    for name in names {
        if settings.partial_marker(&name).exists() {
            out.incomplete.push(name);
        } else if ledger.contains(&name) {
            out.already_uploaded.push(name);
        } else {
            out.pending.push(settings.dir.join(name));
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchCycleOutcome {
    pub cycle: u64,
    pub checked_at: String,
    pub dir: String,
    pub scan: DirectoryScan,
    pub events: Vec<ArchiveEvent>,
    /// Set when a stop arrived mid-cycle and archives were left for later.
    pub interrupted: bool,
}

impl WatchCycleOutcome {
    pub fn uploaded(&self) -> usize {
        self.events.iter().filter(|e| e.status.is_uploaded()).count()
    }

    pub fn failed(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.status, ArchiveStatus::UploadFailed | ArchiveStatus::Rejected))
            .count()
    }

    pub fn console_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.scan.pending.is_empty() {
            out.push(format!(
                "Nothing to upload as of {}. Will check later",
                self.checked_at
            ));
        } else {
            out.push(format!(
                "Found {} uploadable archives",
                self.scan.pending.len()
            ));
        }
        for event in &self.events {
            out.push(event.console_line());
        }
        if self.interrupted {
            out.push("Stop requested; remaining archives left for the next run".to_string());
        }
        out
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchRunSummary {
    pub cycles: u64,
    pub uploaded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

pub struct WatchScheduler<'a, U: Uploader + ?Sized> {
    settings: WatchSettings,
    uploader: &'a U,
    ledger: UploadLedger,
    paths: &'a ColdsyncPaths,
    token: CancellationToken,
    stop_request: Option<StopRequest>,
}

impl<'a, U: Uploader + ?Sized> WatchScheduler<'a, U> {
    pub fn new(
        settings: WatchSettings,
        uploader: &'a U,
        ledger: UploadLedger,
        paths: &'a ColdsyncPaths,
    ) -> Self {
        Self {
            settings,
            uploader,
            ledger,
            paths,
            token: CancellationToken::new(),
            stop_request: None,
        }
    }

    pub fn with_stop_request(mut self, request: StopRequest) -> Self {
        self.stop_request = Some(request);
        self
    }

    #[cfg(test)]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn ledger(&self) -> &UploadLedger {
        &self.ledger
    }

    fn poll_stop_request(&self) {
        if let Some(request) = &self.stop_request {
            if let Err(err) = request.poll(&self.token) {
                warn::emit(
                    WarnCode::W005StopRequestUnreadable,
                    "stop",
                    "",
                    "",
                    &request.path().display().to_string(),
                    &err.to_string(),
                );
            }
        }
    }

    pub fn run_cycle(&mut self, cycle: u64) -> Result<WatchCycleOutcome> {
        let scan = scan_directory(&self.settings, &self.ledger)?;
        let checked_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let mut events = Vec::new();
        let mut interrupted = false;
        let vault_override = self.settings.vault_override.clone();
        for archive in &scan.pending {
            self.poll_stop_request();
            if self.token.is_cancelled() {
                interrupted = true;
                break;
            }
            let mut ctx = ArchiveContext {
                uploader: self.uploader,
                ledger: &mut self.ledger,
                paths: self.paths,
                done_prefix: &self.settings.done_prefix,
                vaults: &self.settings.vaults,
                vault_override: vault_override.as_deref(),
            };
            events.push(process_archive(&mut ctx, archive)?);
        }

        Ok(WatchCycleOutcome {
            cycle,
            checked_at,
            dir: self.settings.dir.display().to_string(),
            scan,
            events,
            interrupted,
        })
    }

    /// Run cycles until cancelled or `max_cycles` is reached, sleeping the
    /// configured interval between cycles.
    pub fn run(&mut self, mut on_cycle: impl FnMut(&WatchCycleOutcome)) -> Result<WatchRunSummary> {
        note(
            self.paths,
            "watcher",
            "started",
            "",
            &format!(
                "dir={} interval_secs={} ledger={}",
                self.settings.dir.display(),
                self.settings.interval.as_secs(),
                self.ledger.path().display()
            ),
        );

        let mut summary = WatchRunSummary::default();
        loop {
            self.poll_stop_request();
            if self.token.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            summary.cycles += 1;
            let outcome = self.run_cycle(summary.cycles)?;
            summary.uploaded += outcome.uploaded();
            summary.failed += outcome.failed();
            on_cycle(&outcome);

            if let Some(max) = self.settings.max_cycles {
                if summary.cycles >= max {
                    break;
                }
            }

            let token = self.token.clone();
            if token.sleep_unless_cancelled(self.settings.interval, |_| self.poll_stop_request()) {
                summary.cancelled = true;
                break;
            }
        }

        note(
            self.paths,
            "watcher",
            "stopped",
            "",
            &format!(
                "cycles={} uploaded={} failed={} cancelled={}",
                summary.cycles, summary.uploaded, summary.failed, summary.cancelled
            ),
        );
        Ok(summary)
    }
}
