use anyhow::Result;

use crate::coldsync::config::load_config;
use crate::coldsync::paths::resolve_paths;
use crate::coldsync::vault::decide_vault;
use crate::commands::CommandReport;

/// Print the vault each archive name would be uploaded to.
pub fn run(names: &[String]) -> Result<CommandReport> {
    let mut report = CommandReport::new("route");
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;

    for name in names {
        match decide_vault(name) {
            Ok(kind) => report.detail(format!("{name} -> {}", kind.vault_name(&cfg.vaults))),
            Err(err) => report.issue(err.to_string()),
        }
    }

    Ok(report)
}
