use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ColdsyncPaths {
    pub coldsync_home: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
}

impl ColdsyncPaths {
    pub fn ledger_file(&self) -> PathBuf {
        self.state_dir.join("uploads.jsonl")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }

    pub fn watch_lock(&self) -> PathBuf {
        self.logs_dir.join("watch.lock")
    }

    pub fn stop_request(&self) -> PathBuf {
        self.state_dir.join("watch.stop")
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    env_path(var).unwrap_or(fallback)
}

pub fn resolve_paths() -> Result<ColdsyncPaths> {
    let coldsync_home = match env_path("COLDSYNC_HOME") {
        Some(home) => home,
        None => required_home_dir()?.join(".coldsync"),
    };

    let state_dir = env_or_default_path("COLDSYNC_STATE_DIR", coldsync_home.join("state"));
    let logs_dir = env_or_default_path("COLDSYNC_LOGS_DIR", coldsync_home.join("logs"));
    let config_file =
        env_or_default_path("COLDSYNC_CONFIG_PATH", coldsync_home.join("coldsync.toml"));

    Ok(ColdsyncPaths {
        coldsync_home,
        state_dir,
        logs_dir,
        config_file,
    })
}
