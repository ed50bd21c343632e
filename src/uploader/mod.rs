//! Upload capability used by the watcher.
//!
//! The watcher only needs "put this archive in that vault, tell me whether it
//! worked". How the bytes get there is up to the implementation; the shipped
//! one runs an external program.

pub mod command;

use anyhow::Result;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Short human summary, typically the tail of the uploader's output.
    pub summary: String,
}

pub trait Uploader {
    /// Upload `archive` into `vault`. An `Err` means the archive must be
    /// retried later.
    fn upload(&self, archive: &Path, vault: &str) -> Result<UploadReceipt>;

    /// Label used in status output.
    fn describe(&self) -> String;
}
