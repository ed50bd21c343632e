use anyhow::Result;
use std::path::PathBuf;

use crate::coldsync::config::{ReconcileConfig, ReconcileProfile, load_config};
use crate::coldsync::local_inventory::load_local_inventory;
use crate::coldsync::paths::resolve_paths;
use crate::coldsync::reconcile::{ReconcileSummary, Severity, reconcile};
use crate::coldsync::remote_inventory::load_vault_inventory;
use crate::commands::CommandReport;

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub local: PathBuf,
    pub remote: PathBuf,
    pub profile: Option<ReconcileProfile>,
    pub tolerance_bytes: Option<u64>,
    pub replace_quotes: Option<bool>,
    pub report_missing_local: Option<bool>,
    pub strict: bool,
}

impl ReconcileOptions {
    /// Command-line values win over the config file and environment.
    fn apply(&self, base: &ReconcileConfig) -> ReconcileConfig {
        let mut out = base.clone();
        if let Some(profile) = self.profile {
            out.profile = profile;
        }
        if self.tolerance_bytes.is_some() {
            out.tolerance_bytes = self.tolerance_bytes;
        }
        if self.replace_quotes.is_some() {
            out.replace_quotes = self.replace_quotes;
        }
        if self.report_missing_local.is_some() {
            out.report_missing_local = self.report_missing_local;
        }
        out
    }
}

pub fn run(opts: &ReconcileOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("reconcile");
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let settings = opts.apply(&cfg.reconcile);

    let local = load_local_inventory(&opts.local, settings.name_rules())?;
    let vault_inventory = load_vault_inventory(&opts.remote)?;
    let remote = vault_inventory.to_inventory();

    let rules = settings.rules();
    let diagnostics = reconcile(&local, &remote, rules);
    for diag in &diagnostics {
        report.detail(diag.to_string());
    }

    let summary = ReconcileSummary::from_diagnostics(&local, &diagnostics);
    report.detail(format!(
        "Compared {} local archives ({} bytes) with {} remote archives ({} bytes), profile={} tolerance={} bytes: matched={} missing_remote={} size_mismatch={} missing_local={}",
        local.len(),
        local.total_bytes(),
        remote.len(),
        remote.total_bytes(),
        settings.profile.as_str(),
        rules.tolerance_bytes,
        summary.matched,
        summary.missing_remote,
        summary.size_mismatch,
        summary.missing_local
    ));
    if let Some(arn) = &vault_inventory.vault_arn {
        let date = vault_inventory.inventory_date.as_deref().unwrap_or("unknown");
        report.detail(format!("Remote inventory of {arn} taken {date}"));
    }
    if local.is_empty() {
        report.detail(format!("Local inventory {} has no archives", opts.local.display()));
    }
    if local.overwritten() > 0 {
        report.detail(format!(
            "Local inventory repeated {} names; the last entry of each was kept",
            local.overwritten()
        ));
    }
    if remote.overwritten() > 0 {
        report.detail(format!(
            "Remote inventory repeated {} names; the last entry of each was kept",
            remote.overwritten()
        ));
    }

    if opts.strict && summary.has_errors() {
        let missing: Vec<&str> = diagnostics
            .iter()
            .filter(|diag| diag.severity() == Severity::Error)
            .map(|diag| diag.name())
            .collect();
        report.issue(format!(
            "{} archives are missing from remote: {}",
            summary.missing_remote,
            missing.join(", ")
        ));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_override_config_settings() {
        let base = ReconcileConfig {
            tolerance_bytes: Some(10),
            ..ReconcileConfig::default()
        };
        let opts = ReconcileOptions {
            profile: Some(ReconcileProfile::Narrow),
            report_missing_local: Some(true),
            ..ReconcileOptions::default()
        };
        let merged = opts.apply(&base);
        assert_eq!(merged.profile, ReconcileProfile::Narrow);
        assert_eq!(merged.tolerance_bytes(), 10);
        assert!(merged.rules().report_missing_local);
        assert!(!merged.name_rules().replace_quotes);
    }
}
