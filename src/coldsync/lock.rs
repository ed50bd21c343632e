use crate::coldsync::util::pid_alive;
use crate::error::ColdsyncError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive hold on the watcher lock file. The lock is released when the
/// guard is dropped; the file itself is removed on a clean drop.
#[derive(Debug)]
pub struct WatchLock {
    path: PathBuf,
    file: File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: u32,
    pub build_id: Option<String>,
}

impl WatchLock {
    pub fn acquire(path: &Path, build_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            let holder = match read_holder(path) {
                Ok(Some(holder)) => format!("pid {}", holder.pid),
                _ => "another process".to_string(),
            };
            return Err(ColdsyncError::WatcherLocked(format!(
                "{holder} holds {}",
                path.display()
            ))
            .into());
        }

        file.set_len(0)
            .with_context(|| format!("failed to truncate {}", path.display()))?;
        write!(file, "{}\n{build_id}\n", std::process::id())
            .with_context(|| format!("failed to write {}", path.display()))?;
        file.sync_data()
            .with_context(|| format!("failed to sync {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WatchLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

/// Read the pid (and build id, if present) written by [`WatchLock::acquire`].
pub fn read_holder(path: &Path) -> Result<Option<LockHolder>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(pid_str) = lines.next() else {
        return Ok(None);
    };
    let pid = pid_str
        .parse::<u32>()
        .with_context(|| format!("invalid watcher pid in lock file: {pid_str}"))?;
    Ok(Some(LockHolder {
        pid,
        build_id: lines.next().map(ToOwned::to_owned),
    }))
}

/// The holder, but only if its process is still running.
pub fn live_holder(path: &Path) -> Result<Option<LockHolder>> {
    Ok(read_holder(path)?.filter(|holder| pid_alive(holder.pid)))
}
