use anyhow::Result;
use std::env;

use crate::coldsync::config::load_config;
use crate::coldsync::ledger::UploadLedger;
use crate::coldsync::lock::read_holder;
use crate::coldsync::paths::resolve_paths;
use crate::coldsync::util::pid_alive;
use crate::commands::{BUILD_ID, CommandReport};
use crate::uploader::Uploader;
use crate::uploader::command::CommandUploader;

include!(concat!(env!("OUT_DIR"), "/coldsync_env_allowlist.rs"));

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    let paths = resolve_paths()?;

    report.detail(format!("build_id={BUILD_ID}"));
    report.detail(format!("coldsync_home={}", paths.coldsync_home.display()));
    report.detail(format!(
        "config_file={} exists={}",
        paths.config_file.display(),
        paths.config_file.exists()
    ));
    report.detail(format!("state_dir={}", paths.state_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    let cfg = match load_config(&paths) {
        Ok(cfg) => cfg,
        Err(err) => {
            report.issue(format!("{err:#}"));
            return Ok(report);
        }
    };
    let rules = cfg.reconcile.rules();
    report.detail(format!(
        "reconcile.profile={} tolerance_bytes={} replace_quotes={} report_missing_local={}",
        cfg.reconcile.profile.as_str(),
        rules.tolerance_bytes,
        cfg.reconcile.name_rules().replace_quotes,
        rules.report_missing_local
    ));
    report.detail(format!(
        "watcher.dir={} poll_interval_secs={}",
        cfg.watcher
            .dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "<working directory>".to_string()),
        cfg.watcher.poll_interval_secs
    ));
    report.detail(format!(
        "vaults.movies={} vaults.tv_shows={}",
        cfg.vaults.movies, cfg.vaults.tv_shows
    ));

    match CommandUploader::from_config(&cfg.uploader) {
        Ok(uploader) => report.detail(format!("uploader={}", uploader.describe())),
        Err(err) => report.detail(format!("uploader=unavailable ({err:#})")),
    }

    match UploadLedger::load(&paths.ledger_file()) {
        Ok(ledger) => report.detail(format!(
            "ledger={} archives={}",
            ledger.path().display(),
            ledger.len()
        )),
        Err(err) => report.issue(format!("ledger unreadable: {err:#}")),
    }

    let lock_path = paths.watch_lock();
    match read_holder(&lock_path) {
        Ok(None) => report.detail("watcher=stopped"),
        Ok(Some(holder)) => {
            let state = if pid_alive(holder.pid) {
                "running"
            } else {
                "stale-lock"
            };
            report.detail(format!("watcher={state} pid={}", holder.pid));
            if let Some(build_id) = holder.build_id.as_deref() {
                if build_id != BUILD_ID {
                    report.detail(format!(
                        "watcher.build_mismatch lock={build_id} current={BUILD_ID}"
                    ));
                }
            }
        }
        Err(err) => report.issue(format!("watcher lock unreadable: {err:#}")),
    }

    let set_vars: Vec<&str> = GENERATED_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some())
        .collect();
    report.detail(format!(
        "env.recognized={} env.set={}",
        GENERATED_ENV_ALLOWLIST.len(),
        if set_vars.is_empty() {
            "-".to_string()
        } else {
            set_vars.join(",")
        }
    ));

    Ok(report)
}
