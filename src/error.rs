use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{path}:{line}: expected `<kilobytes> <name>`, found no name")]
    MissingName { path: String, line: usize },
    #[error("{path}:{line}: size `{token}` is not a whole number of kilobytes")]
    InvalidSize {
        path: String,
        line: usize,
        token: String,
    },
    #[error("{path}:{line}: size of {kilobytes} KiB does not fit in bytes")]
    SizeOverflow {
        path: String,
        line: usize,
        kilobytes: u64,
    },
    #[error("{path}: remote inventory has unexpected structure: {source}")]
    RemoteStructure {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("archive name `{0}` has no extension")]
    MissingExtension(String),
    #[error("couldn't match `{0}` to a vault (expected `<title> (<year>)` or `<title> - Season <n>` / `<title> - Specials`)")]
    Unmatched(String),
}

#[derive(Debug, Error)]
pub enum ColdsyncError {
    #[error("uploader binary unavailable: {0}")]
    MissingUploaderBinary(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("a watcher is already running: {0}")]
    WatcherLocked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnCode {
    W001UploadFailed,
    W002RenameFailed,
    W003LedgerWriteFailed,
    W004NamingRejected,
    W005StopRequestUnreadable,
    W006AuditWriteFailed,
}

impl WarnCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::W001UploadFailed => "W001_UPLOAD_FAILED",
            Self::W002RenameFailed => "W002_RENAME_FAILED",
            Self::W003LedgerWriteFailed => "W003_LEDGER_WRITE_FAILED",
            Self::W004NamingRejected => "W004_NAMING_REJECTED",
            Self::W005StopRequestUnreadable => "W005_STOP_REQUEST_UNREADABLE",
            Self::W006AuditWriteFailed => "W006_AUDIT_WRITE_FAILED",
        }
    }
}
