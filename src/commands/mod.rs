pub mod ledger;
pub mod reconcile;
pub mod route;
pub mod status;
pub mod stop;
pub mod upload;
pub mod watch;

use crate::coldsync::config::UploaderConfig;
use crate::uploader::command::CommandUploader;
use serde::Serialize;

pub const BUILD_ID: &str = env!("BUILD_UUID");

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Resolve the configured uploader, recording an issue when it cannot run.
pub fn ensure_uploader_available(
    cfg: &UploaderConfig,
    report: &mut CommandReport,
) -> Option<CommandUploader> {
    match CommandUploader::from_config(cfg) {
        Ok(uploader) => Some(uploader),
        Err(err) => {
            report.issue(format!(
                "{err:#}; set COLDSYNC_UPLOADER_BIN or [uploader].program, or put `{}` on PATH",
                cfg.program
            ));
            None
        }
    }
}
