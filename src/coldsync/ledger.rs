use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One completed upload. Appended before the archive is renamed, so a
/// failed rename cannot cause a second upload after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub archive: String,
    pub vault: String,
    pub size_bytes: u64,
    pub uploaded_at_epoch_secs: u64,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct UploadLedger {
    path: PathBuf,
    archives: BTreeSet<String>,
}

fn read_records(path: &Path) -> Result<Vec<UploadRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: UploadRecord = serde_json::from_str(trimmed).with_context(|| {
            format!(
                "failed to parse ledger line {} in {}",
                idx + 1,
                path.display()
            )
        })?;
        out.push(entry);
    }
    Ok(out)
}

fn write_records(path: &Path, records: &[UploadRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

impl UploadLedger {
    pub fn load(path: &Path) -> Result<Self> {
        let archives = read_records(path)?
            .into_iter()
            .map(|record| record.archive)
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            archives,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, archive: &str) -> bool {
        self.archives.contains(archive)
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Remembered in memory even if the append fails, so the running process
    /// still won't upload the archive twice.
    pub fn record(&mut self, record: &UploadRecord) -> Result<()> {
        self.archives.insert(record.archive.clone());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let line = format!("{}\n", serde_json::to_string(record)?);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("failed to sync {}", self.path.display()))?;
        Ok(())
    }

    pub fn records(&self) -> Result<Vec<UploadRecord>> {
        read_records(&self.path)
    }

    /// Drop every record for `archive`; returns how many were removed.
    pub fn forget(&mut self, archive: &str) -> Result<usize> {
        let existing = read_records(&self.path)?;
        let before = existing.len();
        let kept: Vec<UploadRecord> = existing
            .into_iter()
            .filter(|record| record.archive != archive)
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            write_records(&self.path, &kept)?;
        }
        self.archives.remove(archive);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(archive: &str) -> UploadRecord {
        UploadRecord {
            archive: archive.to_string(),
            vault: "Movies".to_string(),
            size_bytes: 10,
            uploaded_at_epoch_secs: 1_600_000_000,
            summary: String::new(),
        }
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ledger = UploadLedger::load(&tmp.path().join("uploads.jsonl")).expect("load");
        assert!(ledger.is_empty());
    }

    #[test]
    fn records_survive_reload() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("state").join("uploads.jsonl");
        let mut ledger = UploadLedger::load(&path).expect("load");
        ledger.record(&record("Heat (1995).zip")).expect("record");
        assert!(ledger.contains("Heat (1995).zip"));

        let reloaded = UploadLedger::load(&path).expect("reload");
        assert!(reloaded.contains("Heat (1995).zip"));
        assert!(!reloaded.contains("Other (2000).zip"));
        assert_eq!(reloaded.records().expect("records")[0], record("Heat (1995).zip"));
    }

    #[test]
    fn forget_rewrites_without_archive() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("uploads.jsonl");
        let mut ledger = UploadLedger::load(&path).expect("load");
        ledger.record(&record("a.zip")).expect("a");
        ledger.record(&record("b.zip")).expect("b");
        ledger.record(&record("a.zip")).expect("a again");

        assert_eq!(ledger.forget("a.zip").expect("forget"), 2);
        assert!(!ledger.contains("a.zip"));
        assert_eq!(ledger.forget("missing.zip").expect("noop"), 0);

        let reloaded = UploadLedger::load(&path).expect("reload");
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("b.zip"));
    }

    #[test]
    fn blank_lines_are_ignored_and_bad_lines_fail() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("uploads.jsonl");
        let good = serde_json::to_string(&record("a.zip")).expect("json");
        fs::write(&path, format!("\n{good}\n\n")).expect("write");
        assert_eq!(UploadLedger::load(&path).expect("load").len(), 1);

        fs::write(&path, format!("{good}\nnot json\n")).expect("write");
        let err = UploadLedger::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("ledger line 2"));
    }

    #[test]
    fn summary_defaults_when_absent() {
        let line = r#"{"archive":"a.zip","vault":"TVShows","size_bytes":1,"uploaded_at_epoch_secs":2}"#;
        let parsed: UploadRecord = serde_json::from_str(line).expect("parse");
        assert_eq!(parsed.summary, "");
    }
}
