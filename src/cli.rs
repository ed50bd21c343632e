use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::coldsync::config::ReconcileProfile;
use crate::commands::reconcile::ReconcileOptions;
use crate::commands::upload::UploadOptions;
use crate::commands::watch::WatchOptions;
use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(name = "coldsync")]
#[command(about = "Reconcile and upload Glacier backup archives", long_about = None)]
pub struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_profile(raw: &str) -> Result<ReconcileProfile, String> {
    ReconcileProfile::parse(raw).ok_or_else(|| format!("unknown profile `{raw}` (use wide or narrow)"))
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compare a local du-style listing with a vault inventory.
    Reconcile {
        /// Local listing, one `<kilobytes> <name>` per line.
        local: PathBuf,
        /// Vault inventory JSON.
        remote: PathBuf,
        #[arg(long, value_parser = parse_profile, value_name = "wide|narrow")]
        profile: Option<ReconcileProfile>,
        /// Largest size difference that still counts as a match.
        #[arg(long, value_name = "BYTES")]
        tolerance_bytes: Option<u64>,
        /// Replace `"` with `-` in local names.
        #[arg(long, conflicts_with = "keep_quotes")]
        replace_quotes: bool,
        #[arg(long)]
        keep_quotes: bool,
        /// Warn about archives only present remotely.
        #[arg(long, conflicts_with = "no_missing_local")]
        missing_local: bool,
        #[arg(long)]
        no_missing_local: bool,
        /// Exit non-zero when any archive is missing from remote.
        #[arg(long)]
        strict: bool,
    },

    /// Show which vault each archive name routes to.
    Route {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Upload a single archive now.
    Upload {
        archive: PathBuf,
        /// Vault to upload into; routed from the name when omitted.
        #[arg(long)]
        vault: Option<String>,
        /// Upload even if the ledger says it was already uploaded.
        #[arg(long)]
        force: bool,
    },

    /// Poll a directory and upload completed archives.
    Watch {
        #[arg(long)]
        once: bool,
        #[arg(long)]
        daemon: bool,
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, value_name = "SECS")]
        interval_secs: Option<u64>,
        /// Upload everything into this vault instead of routing by name.
        #[arg(long)]
        vault: Option<String>,
        #[arg(long, value_name = "N")]
        max_cycles: Option<u64>,
    },

    /// Ask a running watcher to stop.
    Stop,

    /// Inspect or edit the upload ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Show paths, effective configuration and watcher state.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum LedgerAction {
    List,
    /// Forget an archive so it is uploaded again.
    Forget { archive: String },
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for line in &report.details {
        println!("{line}");
    }
    for issue in &report.issues {
        eprintln!("{}: {issue}", report.command);
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Reconcile {
            local,
            remote,
            profile,
            tolerance_bytes,
            replace_quotes,
            keep_quotes,
            missing_local,
            no_missing_local,
            strict,
        } => commands::reconcile::run(&ReconcileOptions {
            local,
            remote,
            profile,
            tolerance_bytes,
            replace_quotes: flag_pair(replace_quotes, keep_quotes),
            report_missing_local: flag_pair(missing_local, no_missing_local),
            strict,
        })?,
        Command::Route { names } => commands::route::run(&names)?,
        Command::Upload {
            archive,
            vault,
            force,
        } => commands::upload::run(&UploadOptions {
            archive,
            vault,
            force,
        })?,
        Command::Watch {
            once,
            daemon,
            dir,
            interval_secs,
            vault,
            max_cycles,
        } => commands::watch::run(&WatchOptions {
            once,
            daemon,
            dir,
            interval_secs,
            vault,
            max_cycles,
            json: cli.json,
        })?,
        Command::Stop => commands::stop::run()?,
        Command::Ledger { action } => match action {
            LedgerAction::List => commands::ledger::list()?,
            LedgerAction::Forget { archive } => commands::ledger::forget(&archive)?,
        },
        Command::Status => commands::status::run()?,
    };

    render(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn upload_requires_archive() {
        let err = Cli::try_parse_from(["coldsync", "upload"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn reconcile_flags_map_to_overrides() {
        let cli = parse(&[
            "coldsync",
            "reconcile",
            "local.txt",
            "remote.json",
            "--profile",
            "narrow",
            "--keep-quotes",
            "--missing-local",
        ]);
        let Command::Reconcile {
            profile,
            replace_quotes,
            keep_quotes,
            missing_local,
            no_missing_local,
            ..
        } = cli.command
        else {
            panic!("expected reconcile");
        };
        assert_eq!(profile, Some(ReconcileProfile::Narrow));
        assert_eq!(flag_pair(replace_quotes, keep_quotes), Some(false));
        assert_eq!(flag_pair(missing_local, no_missing_local), Some(true));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        assert!(
            Cli::try_parse_from(["coldsync", "reconcile", "a", "b", "--profile", "medium"]).is_err()
        );
    }

    #[test]
    fn json_flag_is_global() {
        let cli = parse(&["coldsync", "ledger", "list", "--json"]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Ledger {
                action: LedgerAction::List
            }
        ));
    }

    #[test]
    fn watch_options_parse() {
        let cli = parse(&[
            "coldsync",
            "watch",
            "--once",
            "--dir",
            "/srv/inbox",
            "--vault",
            "Misc",
        ]);
        let Command::Watch {
            once, dir, vault, ..
        } = cli.command
        else {
            panic!("expected watch");
        };
        assert!(once);
        assert_eq!(dir, Some(PathBuf::from("/srv/inbox")));
        assert_eq!(vault.as_deref(), Some("Misc"));
    }
}
